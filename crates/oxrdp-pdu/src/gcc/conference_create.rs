//! T.124 conference-create framing around the GCC user data blocks.

use oxrdp_core::{
    cast_length, invalid_field_err, invalid_field_err_with_source, Decode, DecodeError, DecodeResult, Encode,
    EncodeError, EncodeResult, ReadCursor, WriteCursor,
};

use crate::gcc::{ClientGccBlocks, ServerGccBlocks};
use crate::per;

const CONFERENCE_REQUEST_OBJECT_ID: [u8; 6] = [0, 0, 20, 124, 0, 1];
const CLIENT_TO_SERVER_H221_KEY: &[u8; 4] = b"Duca";
const SERVER_TO_CLIENT_H221_KEY: &[u8; 4] = b"McDn";
const NODE_ID_MIN: u16 = 1001;

const CONFERENCE_REQUEST_CONNECT_PDU_SIZE: u16 = 12;
const CONFERENCE_RESPONSE_CONNECT_PDU_SIZE: u16 = 13;
const OBJECT_IDENTIFIER_KEY: u8 = 0;
const CONFERENCE_REQUEST_CHOICE: u8 = 0;
const CONFERENCE_RESPONSE_CHOICE: u8 = 0x14;
const CONFERENCE_REQUEST_USER_DATA_SELECTION: u8 = 8;
const USER_DATA_NUMBER_OF_SETS: u8 = 1;
const H221_NON_STANDARD_CHOICE: u8 = 0xC0;
const CONFERENCE_RESPONSE_TAG: u32 = 1;
const CONFERENCE_RESPONSE_RESULT: u8 = 0;
const H221_NON_STANDARD_MIN_LENGTH: usize = 4;
const RESULT_ENUM_LENGTH: u8 = 16;
const CONFERENCE_NAME: &[u8] = b"1";

fn per_decode_err(field: &'static str, ctx: &'static str) -> impl FnOnce(per::PerError) -> DecodeError {
    move |e| invalid_field_err_with_source(ctx, field, "PER", e)
}

fn per_encode_err(field: &'static str, ctx: &'static str) -> impl FnOnce(per::PerError) -> EncodeError {
    move |e| invalid_field_err_with_source(ctx, field, "PER", e)
}

/// GCC Conference Create Request wrapping the client blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConferenceCreateRequest {
    pub gcc_blocks: ClientGccBlocks,
}

impl ConferenceCreateRequest {
    const NAME: &'static str = "ConferenceCreateRequest";
}

impl Encode for ConferenceCreateRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let gcc_blocks_len: u16 = cast_length!("gccBlocksLen", self.gcc_blocks.size())?;

        // ConnectData::Key: select object of type OBJECT_IDENTIFIER
        per::write_choice(dst, OBJECT_IDENTIFIER_KEY);
        per::write_object_id(dst, CONFERENCE_REQUEST_OBJECT_ID);

        // ConnectData::connectPDU length
        per::write_length(dst, gcc_blocks_len + CONFERENCE_REQUEST_CONNECT_PDU_SIZE);
        // ConnectGCCPDU (CHOICE): conferenceCreateRequest
        per::write_choice(dst, CONFERENCE_REQUEST_CHOICE);
        // select optional userData from ConferenceCreateRequest
        per::write_selection(dst, CONFERENCE_REQUEST_USER_DATA_SELECTION);
        per::write_numeric_string(dst, CONFERENCE_NAME, 1).map_err(per_encode_err("conferenceName", Self::NAME))?;
        per::write_padding(dst, 1);
        per::write_number_of_sets(dst, USER_DATA_NUMBER_OF_SETS);
        per::write_choice(dst, H221_NON_STANDARD_CHOICE);
        per::write_octet_string(dst, CLIENT_TO_SERVER_H221_KEY, H221_NON_STANDARD_MIN_LENGTH)
            .map_err(per_encode_err("h221Key", Self::NAME))?;

        per::write_length(dst, gcc_blocks_len);
        self.gcc_blocks.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let gcc_blocks_len = self.gcc_blocks.size() as u16;

        per::CHOICE_SIZE
            + CONFERENCE_REQUEST_OBJECT_ID.len()
            + per::sizeof_length(CONFERENCE_REQUEST_CONNECT_PDU_SIZE + gcc_blocks_len)
            + usize::from(CONFERENCE_REQUEST_CONNECT_PDU_SIZE)
            + per::sizeof_length(gcc_blocks_len)
            + usize::from(gcc_blocks_len)
    }
}

impl<'de> Decode<'de> for ConferenceCreateRequest {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        if per::read_choice(src).map_err(per_decode_err("connectDataKey", Self::NAME))? != OBJECT_IDENTIFIER_KEY {
            return Err(invalid_field_err!("connectDataKey", "unexpected ConnectData key"));
        }
        if per::read_object_id(src).map_err(per_decode_err("objectId", Self::NAME))? != CONFERENCE_REQUEST_OBJECT_ID {
            return Err(invalid_field_err!("objectId", "unexpected ConnectData key value"));
        }

        let _length = per::read_length(src).map_err(per_decode_err("connectPduLen", Self::NAME))?;

        if per::read_choice(src).map_err(per_decode_err("choice", Self::NAME))? != CONFERENCE_REQUEST_CHOICE {
            return Err(invalid_field_err!("choice", "expected conferenceCreateRequest"));
        }
        if per::read_selection(src).map_err(per_decode_err("selection", Self::NAME))?
            != CONFERENCE_REQUEST_USER_DATA_SELECTION
        {
            return Err(invalid_field_err!("selection", "expected userData selection"));
        }

        per::read_numeric_string(src, 1).map_err(per_decode_err("conferenceName", Self::NAME))?;
        per::read_padding(src, 1).map_err(per_decode_err("padding", Self::NAME))?;

        if per::read_number_of_sets(src).map_err(per_decode_err("numberOfSets", Self::NAME))?
            != USER_DATA_NUMBER_OF_SETS
        {
            return Err(invalid_field_err!("numberOfSets", "expected a single user data set"));
        }
        if per::read_choice(src).map_err(per_decode_err("userDataChoice", Self::NAME))? != H221_NON_STANDARD_CHOICE {
            return Err(invalid_field_err!("userDataChoice", "expected h221NonStandard"));
        }
        if per::read_octet_string(src, H221_NON_STANDARD_MIN_LENGTH).map_err(per_decode_err("h221Key", Self::NAME))?
            != CLIENT_TO_SERVER_H221_KEY
        {
            return Err(invalid_field_err!("h221Key", "invalid client-to-server H.221 key"));
        }

        let _gcc_blocks_len = per::read_length(src).map_err(per_decode_err("gccBlocksLen", Self::NAME))?;
        let gcc_blocks = ClientGccBlocks::decode(src)?;

        Ok(Self { gcc_blocks })
    }
}

/// GCC Conference Create Response wrapping the server blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConferenceCreateResponse {
    pub user_id: u16,
    pub gcc_blocks: ServerGccBlocks,
}

impl ConferenceCreateResponse {
    const NAME: &'static str = "ConferenceCreateResponse";
}

impl Encode for ConferenceCreateResponse {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let gcc_blocks_len: u16 = cast_length!("gccBlocksLen", self.gcc_blocks.size())?;

        per::write_choice(dst, OBJECT_IDENTIFIER_KEY);
        per::write_object_id(dst, CONFERENCE_REQUEST_OBJECT_ID);

        per::write_length(dst, gcc_blocks_len + CONFERENCE_RESPONSE_CONNECT_PDU_SIZE);
        per::write_choice(dst, CONFERENCE_RESPONSE_CHOICE);
        per::write_u16(dst, self.user_id, NODE_ID_MIN).map_err(per_encode_err("nodeId", Self::NAME))?;
        per::write_u32(dst, CONFERENCE_RESPONSE_TAG);
        per::write_enum(dst, CONFERENCE_RESPONSE_RESULT);
        per::write_number_of_sets(dst, USER_DATA_NUMBER_OF_SETS);
        per::write_choice(dst, H221_NON_STANDARD_CHOICE);
        per::write_octet_string(dst, SERVER_TO_CLIENT_H221_KEY, H221_NON_STANDARD_MIN_LENGTH)
            .map_err(per_encode_err("h221Key", Self::NAME))?;

        per::write_length(dst, gcc_blocks_len);
        self.gcc_blocks.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let gcc_blocks_len = self.gcc_blocks.size() as u16;

        per::CHOICE_SIZE
            + CONFERENCE_REQUEST_OBJECT_ID.len()
            + per::sizeof_length(CONFERENCE_RESPONSE_CONNECT_PDU_SIZE + gcc_blocks_len)
            + usize::from(CONFERENCE_RESPONSE_CONNECT_PDU_SIZE)
            + per::sizeof_length(gcc_blocks_len)
            + usize::from(gcc_blocks_len)
    }
}

impl<'de> Decode<'de> for ConferenceCreateResponse {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        if per::read_choice(src).map_err(per_decode_err("connectDataKey", Self::NAME))? != OBJECT_IDENTIFIER_KEY {
            return Err(invalid_field_err!("connectDataKey", "unexpected ConnectData key"));
        }
        if per::read_object_id(src).map_err(per_decode_err("objectId", Self::NAME))? != CONFERENCE_REQUEST_OBJECT_ID {
            return Err(invalid_field_err!("objectId", "unexpected ConnectData key value"));
        }

        // Must be ignored by the client per MS-RDPBCGR.
        let _length = per::read_length(src).map_err(per_decode_err("connectPduLen", Self::NAME))?;

        if per::read_choice(src).map_err(per_decode_err("choice", Self::NAME))? != CONFERENCE_RESPONSE_CHOICE {
            return Err(invalid_field_err!("choice", "expected conferenceCreateResponse"));
        }

        let user_id = per::read_u16(src, NODE_ID_MIN).map_err(per_decode_err("nodeId", Self::NAME))?;

        if per::read_u32(src).map_err(per_decode_err("tag", Self::NAME))? != CONFERENCE_RESPONSE_TAG {
            return Err(invalid_field_err!("tag", "unexpected conference create response tag"));
        }
        if per::read_enum(src, RESULT_ENUM_LENGTH).map_err(per_decode_err("result", Self::NAME))?
            != CONFERENCE_RESPONSE_RESULT
        {
            return Err(invalid_field_err!("result", "invalid conference create response result"));
        }
        if per::read_number_of_sets(src).map_err(per_decode_err("numberOfSets", Self::NAME))?
            != USER_DATA_NUMBER_OF_SETS
        {
            return Err(invalid_field_err!("numberOfSets", "expected a single user data set"));
        }
        if per::read_choice(src).map_err(per_decode_err("userDataChoice", Self::NAME))? != H221_NON_STANDARD_CHOICE {
            return Err(invalid_field_err!("userDataChoice", "expected h221NonStandard"));
        }
        if per::read_octet_string(src, H221_NON_STANDARD_MIN_LENGTH).map_err(per_decode_err("h221Key", Self::NAME))?
            != SERVER_TO_CLIENT_H221_KEY
        {
            return Err(invalid_field_err!("h221Key", "invalid server-to-client H.221 key"));
        }

        let _gcc_blocks_len = per::read_length(src).map_err(per_decode_err("gccBlocksLen", Self::NAME))?;
        let gcc_blocks = ServerGccBlocks::decode(src)?;

        Ok(Self { user_id, gcc_blocks })
    }
}
