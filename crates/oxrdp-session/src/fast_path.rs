//! The fast-path receive pipeline: security stripping, fragmentation
//! reassembly and bitmap update decoding.

use oxrdp_core::{decode, Decode as _, ReadCursor};
use oxrdp_pdu::bitmap::BitmapUpdateData;
use oxrdp_pdu::fast_path::{EncryptionFlags, FastPathHeader, FastPathUpdatePdu, Fragmentation, UpdateCode};
use oxrdp_security::SecurityContext;

use crate::active_stage::BitmapUpdate;
use crate::{SessionError, SessionErrorExt as _, SessionResult};

pub struct Processor {
    complete_data: CompleteData,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            complete_data: CompleteData::new(),
        }
    }

    /// Processes one fast-path frame, returning the bitmap updates it
    /// produced (empty while a fragmented update is still accumulating or
    /// for non-bitmap update codes).
    pub fn process(
        &mut self,
        frame: &[u8],
        security: Option<&mut SecurityContext>,
    ) -> SessionResult<Vec<BitmapUpdate>> {
        let mut src = ReadCursor::new(frame);
        let header = FastPathHeader::decode(&mut src).map_err(SessionError::decode)?;

        trace!(?header, "Received fast-path frame");

        let payload = src.read_remaining();

        let payload = if header.flags.contains(EncryptionFlags::ENCRYPTED) {
            let security =
                security.ok_or_else(|| SessionError::general("encrypted fast-path frame without a security context"))?;
            security.decrypt_payload(payload).map_err(SessionError::security)?
        } else {
            payload.to_vec()
        };

        let update_pdu: FastPathUpdatePdu<'_> = decode(&payload).map_err(SessionError::decode)?;

        trace!(update_code = ?update_pdu.update_code, fragmentation = ?update_pdu.fragmentation);

        if update_pdu.compression_flags.is_some() {
            debug!("Skipping a compressed fast-path update (compression is never advertised)");
            return Ok(Vec::new());
        }

        let update_code = update_pdu.update_code;

        let Some(data) = self.complete_data.process_data(update_pdu.data, update_pdu.fragmentation) else {
            return Ok(Vec::new());
        };

        match update_code {
            UpdateCode::Bitmap => {
                let bitmap_update: BitmapUpdateData<'_> = decode(&data).map_err(SessionError::decode)?;
                decode_bitmap_rectangles(bitmap_update)
            }
            UpdateCode::Synchronize => Ok(Vec::new()),
            other => {
                debug!(?other, "Ignoring an unsupported fast-path update");
                Ok(Vec::new())
            }
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands the rectangles of a bitmap update, decompressing where needed.
pub(crate) fn decode_bitmap_rectangles(update: BitmapUpdateData<'_>) -> SessionResult<Vec<BitmapUpdate>> {
    let mut updates = Vec::with_capacity(update.rectangles.len());

    for rectangle in update.rectangles {
        trace!(?rectangle);

        if rectangle.is_compressed() {
            let mut data = Vec::new();

            oxrdp_graphics::rle::decompress(
                rectangle.bitmap_data,
                &mut data,
                rectangle.width,
                rectangle.height,
                rectangle.bits_per_pixel,
            )
            .map_err(SessionError::rle)?;

            updates.push(BitmapUpdate {
                rectangle: rectangle.rectangle,
                width: rectangle.width,
                height: rectangle.height,
                bits_per_pixel: rectangle.bits_per_pixel,
                top_down: true,
                data,
            });
        } else {
            // Uncompressed wire bitmaps are bottom-up, left-to-right.
            updates.push(BitmapUpdate {
                rectangle: rectangle.rectangle,
                width: rectangle.width,
                height: rectangle.height,
                bits_per_pixel: rectangle.bits_per_pixel,
                top_down: false,
                data: rectangle.bitmap_data.to_vec(),
            });
        }
    }

    Ok(updates)
}

#[derive(Debug, PartialEq)]
struct CompleteData {
    fragmented_data: Option<Vec<u8>>,
}

impl CompleteData {
    fn new() -> Self {
        Self { fragmented_data: None }
    }

    fn process_data(&mut self, data: &[u8], fragmentation: Fragmentation) -> Option<Vec<u8>> {
        match fragmentation {
            Fragmentation::Single => {
                self.check_data_is_empty();

                Some(data.to_vec())
            }
            Fragmentation::First => {
                self.check_data_is_empty();

                self.fragmented_data = Some(data.to_vec());

                None
            }
            Fragmentation::Next => {
                self.append_data(data);

                None
            }
            Fragmentation::Last => {
                self.append_data(data);

                self.fragmented_data.take()
            }
        }
    }

    fn check_data_is_empty(&mut self) {
        if self.fragmented_data.is_some() {
            warn!("Skipping a pending fragmented fast-path update");
            self.fragmented_data = None;
        }
    }

    fn append_data(&mut self, data: &[u8]) {
        if let Some(fragmented_data) = self.fragmented_data.as_mut() {
            fragmented_data.extend_from_slice(data);
        } else {
            warn!("Got a Next fragment without a prior First fragment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_path_bitmap_frame(left: u16, top: u16) -> Vec<u8> {
        // One uncompressed 1x1 16bpp rectangle at (left, top).
        let mut bitmap = Vec::new();
        bitmap.extend_from_slice(&1u16.to_le_bytes()); // updateType = bitmap
        bitmap.extend_from_slice(&1u16.to_le_bytes()); // numberRectangles
        bitmap.extend_from_slice(&left.to_le_bytes());
        bitmap.extend_from_slice(&top.to_le_bytes());
        bitmap.extend_from_slice(&left.to_le_bytes()); // right
        bitmap.extend_from_slice(&top.to_le_bytes()); // bottom
        bitmap.extend_from_slice(&1u16.to_le_bytes()); // width
        bitmap.extend_from_slice(&1u16.to_le_bytes()); // height
        bitmap.extend_from_slice(&16u16.to_le_bytes()); // bpp
        bitmap.extend_from_slice(&0u16.to_le_bytes()); // no compression
        bitmap.extend_from_slice(&2u16.to_le_bytes()); // bitmapLength
        bitmap.extend_from_slice(&[0xAA, 0xBB]);

        // TS_FP_UPDATE header: bitmap update, single fragment
        let mut update = vec![0x01];
        update.extend_from_slice(&(bitmap.len() as u16).to_le_bytes());
        update.extend_from_slice(&bitmap);

        // Fast-path frame header: action 0, short length
        let total = update.len() + 2;
        let mut frame = vec![0x00, total as u8];
        frame.extend_from_slice(&update);
        frame
    }

    #[test]
    fn bitmap_updates_are_delivered_in_wire_order() {
        let mut processor = Processor::new();

        let coordinates = [(0u16, 0u16), (10, 0), (0, 10)];

        let mut received = Vec::new();
        for (left, top) in coordinates {
            let frame = fast_path_bitmap_frame(left, top);
            received.extend(processor.process(&frame, None).unwrap());
        }

        let received_coordinates: Vec<(u16, u16)> = received
            .iter()
            .map(|update| (update.rectangle.left, update.rectangle.top))
            .collect();

        assert_eq!(received_coordinates, coordinates);
    }

    #[test]
    fn fragmented_update_is_reassembled() {
        let mut processor = Processor::new();

        let full = fast_path_bitmap_frame(5, 5);
        // Split the update payload (after the 2-byte frame header and the
        // 3-byte update header) into two fragments.
        let payload = &full[5..];
        let (first_half, second_half) = payload.split_at(payload.len() / 2);

        let make_frame = |fragmentation: u8, chunk: &[u8]| {
            let mut update = vec![0x01 | (fragmentation << 4)];
            update.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            update.extend_from_slice(chunk);

            let mut frame = vec![0x00, (update.len() + 2) as u8];
            frame.extend_from_slice(&update);
            frame
        };

        // First fragment: nothing delivered yet.
        let first = make_frame(0x2, first_half);
        assert!(processor.process(&first, None).unwrap().is_empty());

        // Last fragment: the full update is decoded.
        let last = make_frame(0x1, second_half);
        let updates = processor.process(&last, None).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].rectangle.left, 5);
    }
}
