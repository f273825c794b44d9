//! Macros shared by the encoding and decoding code of every oxrdp crate.

/// Returns a `NotEnoughBytes` error when the cursor holds fewer bytes than
/// expected. The single-argument form uses `Self::NAME` as context.
#[macro_export]
macro_rules! ensure_size {
    (ctx: $ctx:expr, in: $buf:ident, size: $expected:expr) => {{
        let received = $buf.len();
        let expected = $expected;
        if !(received >= expected) {
            return Err($crate::not_enough_bytes_err($ctx, received, expected));
        }
    }};
    (in: $buf:ident, size: $expected:expr) => {{
        $crate::ensure_size!(ctx: Self::NAME, in: $buf, size: $expected)
    }};
}

#[macro_export]
macro_rules! ensure_fixed_part_size {
    (in: $buf:ident) => {{
        $crate::ensure_size!(ctx: Self::NAME, in: $buf, size: Self::FIXED_PART_SIZE)
    }};
}

/// Shorthand for [`invalid_field_err`](crate::invalid_field_err) with
/// `Self::NAME` as context.
#[macro_export]
macro_rules! invalid_field_err {
    ( $context:expr, $field:expr, $reason:expr $(,)? ) => {{
        $crate::invalid_field_err($context, $field, $reason)
    }};
    ( $field:expr, $reason:expr $(,)? ) => {{
        $crate::invalid_field_err(Self::NAME, $field, $reason)
    }};
}

#[macro_export]
macro_rules! unexpected_message_type_err {
    ( $context:expr, $got:expr $(,)? ) => {{
        $crate::unexpected_message_type_err($context, $got)
    }};
    ( $got:expr $(,)? ) => {{
        $crate::unexpected_message_type_err(Self::NAME, $got)
    }};
}

#[macro_export]
macro_rules! unsupported_version_err {
    ( $context:expr, $got:expr $(,)? ) => {{
        $crate::unsupported_version_err($context, $got)
    }};
    ( $got:expr $(,)? ) => {{
        $crate::unsupported_version_err(Self::NAME, $got)
    }};
}

#[macro_export]
macro_rules! other_err {
    ( $context:expr, $description:expr $(,)? ) => {{
        $crate::other_err($context, $description)
    }};
    ( $description:expr $(,)? ) => {{
        $crate::other_err(Self::NAME, $description)
    }};
}

/// Fallible integral conversion reported as an `InvalidField` error.
#[macro_export]
macro_rules! cast_length {
    ($ctx:expr, $field:expr, $len:expr) => {{
        $len.try_into()
            .map_err(|e| $crate::invalid_field_err_with_source($ctx, $field, "out of range conversion", e))
    }};
    ($field:expr, $len:expr) => {{
        $crate::cast_length!(Self::NAME, $field, $len)
    }};
}

/// Writes `n` zero bytes with as few cursor calls as possible.
#[macro_export]
macro_rules! write_padding {
    ($dst:expr, 1) => {
        $dst.write_u8(0)
    };
    ($dst:expr, 2) => {
        $dst.write_u16(0)
    };
    ($dst:expr, 4) => {
        $dst.write_u32(0)
    };
    ($dst:expr, $n:expr) => {
        for _ in 0..$n {
            $dst.write_u8(0);
        }
    };
}

/// Moves the read cursor past `n` padding bytes.
#[macro_export]
macro_rules! read_padding {
    ($src:expr, $n:expr) => {
        $src.advance($n)
    };
}

/// Asserts that a trait supports dynamic dispatch.
#[macro_export]
macro_rules! assert_obj_safe {
    ($($xs:path),+ $(,)?) => {
        $(const _: Option<&dyn $xs> = None;)+
    };
}
