//! Wire format: DNS messages as defined by RFC 1035, carried in single UDP
//! datagrams.
//!
//! The codec itself is `hickory-proto`; this module is the only place the
//! transport touches it.

use std::collections::BTreeSet;

use hickory_proto::op::{Message, Query};
use hickory_proto::rr::Record;

use crate::error::ProtocolError;

/// Largest datagram payload that can be sent in one UDP packet.
pub const MAX_MESSAGE_SIZE: usize = 9000;

/// Encode a message into a single datagram payload.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let bytes = msg
        .to_vec()
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::Encode(format!(
            "message size {} exceeds maximum {MAX_MESSAGE_SIZE}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Decode a message from a datagram payload.
pub fn decode_message(payload: &[u8]) -> Result<Message, ProtocolError> {
    Message::from_vec(payload).map_err(|e| ProtocolError::Decode(e.to_string()))
}

/// A query message carrying exactly one question.
pub fn query_message(question: Query) -> Message {
    let mut msg = Message::new();
    msg.add_query(question);
    msg
}

/// The first answer record matching `question` exactly: same owner name
/// (case-sensitive), same type, same class.
pub fn find_answer<'m>(msg: &'m Message, question: &Query) -> Option<&'m Record> {
    let wanted = question.name().to_ascii();
    msg.answers().iter().find(|rr| {
        rr.record_type() == question.query_type()
            && rr.dns_class() == question.query_class()
            && rr.name().to_ascii() == wanted
    })
}

/// Unique owner names across every section, for diagnostics.
pub fn message_names(msg: &Message) -> Vec<String> {
    let mut names = BTreeSet::new();
    names.extend(msg.queries().iter().map(|q| q.name().to_ascii()));
    for section in [msg.answers(), msg.name_servers(), msg.additionals()] {
        names.extend(section.iter().map(|rr| rr.name().to_ascii()));
    }
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::MessageType;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
    use std::net::Ipv4Addr;

    fn question(name: &str, rtype: RecordType) -> Query {
        let mut q = Query::query(Name::from_ascii(name).unwrap(), rtype);
        q.set_query_class(DNSClass::IN);
        q
    }

    fn a_record(name: &str, ip: Ipv4Addr) -> Record {
        Record::from_rdata(Name::from_ascii(name).unwrap(), 120, RData::A(A(ip)))
    }

    fn response(answers: Vec<Record>) -> Message {
        let mut msg = Message::new();
        msg.set_message_type(MessageType::Response);
        msg.set_authoritative(true);
        for rr in answers {
            msg.add_answer(rr);
        }
        msg
    }

    #[test]
    fn query_message_encodes_and_decodes() {
        let msg = query_message(question("host.local.", RecordType::A));
        let bytes = encode_message(&msg).unwrap();
        // header is 12 bytes, question section follows
        assert!(bytes.len() > 12);

        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded.queries().len(), 1);
        assert_eq!(decoded.queries()[0].name().to_ascii(), "host.local.");
        assert_eq!(decoded.queries()[0].query_type(), RecordType::A);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = decode_message(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn find_answer_requires_exact_match() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);
        let msg = response(vec![
            a_record("other.local.", Ipv4Addr::new(10, 0, 0, 1)),
            a_record("host.local.", ip),
        ]);

        let rr = find_answer(&msg, &question("host.local.", RecordType::A)).unwrap();
        assert_eq!(rr.data(), Some(&RData::A(A(ip))));

        assert!(find_answer(&msg, &question("host.local.", RecordType::AAAA)).is_none());
        assert!(find_answer(&msg, &question("HOST.local.", RecordType::A)).is_none());
    }

    #[test]
    fn find_answer_takes_first_of_several() {
        let first = Ipv4Addr::new(192, 168, 1, 1);
        let msg = response(vec![
            a_record("host.local.", first),
            a_record("host.local.", Ipv4Addr::new(192, 168, 1, 2)),
        ]);
        let rr = find_answer(&msg, &question("host.local.", RecordType::A)).unwrap();
        assert_eq!(rr.data(), Some(&RData::A(A(first))));
    }

    #[test]
    fn message_names_are_unique_across_sections() {
        let mut msg = response(vec![a_record("host.local.", Ipv4Addr::LOCALHOST)]);
        msg.add_query(question("host.local.", RecordType::A));
        msg.add_additional(a_record("peer.local.", Ipv4Addr::LOCALHOST));
        assert_eq!(message_names(&msg), vec!["host.local.", "peer.local."]);
    }
}
