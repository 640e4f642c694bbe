//! DNS message handling on top of `hickory-proto`.

use hickory_proto::op::{Message, MessageType, OpCode};

use crate::error::Result;

const HEADER_LEN: usize = 12;

/// Parse a raw DNS message.
pub fn parse(data: &[u8]) -> Result<Message> {
    Ok(Message::from_vec(data)?)
}

/// Read the 16-bit message id without a full parse.
pub fn message_id(data: &[u8]) -> Option<u16> {
    if data.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([data[0], data[1]]))
}

/// Build the query relayed upstream for an admitted client query.
///
/// Carries the original questions, recursion-desired bit and EDNS record
/// under a new transaction id. Other header flags are not preserved; the
/// authoritative bit is set.
pub fn upstream_query(query: &Message, id: u16) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_recursion_desired(query.recursion_desired())
        .add_queries(query.queries().to_vec());

    if let Some(edns) = query.extensions() {
        message.set_edns(edns.clone());
    }

    message
}

/// Encode a message to wire format bytes.
pub fn to_bytes(message: &Message) -> Result<Vec<u8>> {
    Ok(message.to_vec()?)
}

/// Rewrite the transaction id of a raw response in place.
///
/// The upstream answer is otherwise relayed byte for byte.
pub fn set_message_id(response: &mut [u8], id: u16) -> bool {
    if response.len() < HEADER_LEN {
        return false;
    }
    response[..2].copy_from_slice(&id.to_be_bytes());
    true
}
