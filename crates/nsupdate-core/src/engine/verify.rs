//! Read-back verification helpers

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};

use crate::address::AddressSet;
use crate::error::{Error, Result};

/// Build an A query for `fqdn`
pub fn build_query(fqdn: &str) -> Result<Message> {
    let name = Name::from_ascii(fqdn).map_err(|e| Error::record_encoding(fqdn, e))?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(name, RecordType::A));
    Ok(message)
}

/// Collect the normalized A addresses of a response's answer section
///
/// Answers of any other type are skipped.
pub fn extract_addresses(response: &Message) -> Result<AddressSet> {
    let mut addresses = AddressSet::new();
    for record in response.answers() {
        if let Some(RData::A(a)) = record.data() {
            addresses.insert(&a.0.to_string())?;
        }
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::Record;
    use hickory_proto::rr::rdata::{A, AAAA, CNAME};

    fn name(text: &str) -> Name {
        Name::from_ascii(text).unwrap()
    }

    #[test]
    fn test_query_shape() {
        let query = build_query("www.example.com.").unwrap();
        assert_eq!(query.op_code(), OpCode::Query);
        assert!(query.recursion_desired());
        assert_eq!(query.queries().len(), 1);
        assert_eq!(query.queries()[0].query_type(), RecordType::A);
        assert_eq!(query.queries()[0].name(), &name("www.example.com."));
    }

    #[test]
    fn test_extract_ignores_other_types() {
        let mut response = Message::new();
        response.add_answer(Record::from_rdata(
            name("www.example.com."),
            300,
            RData::CNAME(CNAME(name("web.example.com."))),
        ));
        response.add_answer(Record::from_rdata(
            name("web.example.com."),
            300,
            RData::A(A::new(10, 0, 0, 2)),
        ));
        response.add_answer(Record::from_rdata(
            name("web.example.com."),
            300,
            RData::AAAA(AAAA::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        ));
        response.add_answer(Record::from_rdata(
            name("web.example.com."),
            300,
            RData::A(A::new(10, 0, 0, 1)),
        ));

        let addresses = extract_addresses(&response).unwrap();
        assert_eq!(addresses.to_vec(), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_extract_empty_answer() {
        let addresses = extract_addresses(&Message::new()).unwrap();
        assert!(addresses.is_empty());
    }
}
