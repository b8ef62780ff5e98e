//! Minimal request payloads used to coax a reply out of UDP services.
//!
//! None of these are full protocol clients. A reply of any shape from the
//! probed address counts, so the payloads only have to look plausible enough
//! for a service (or a permissive middlebox) to answer.
use rand::RngCore;

/// Sent to any port without a dedicated payload.
pub const FILLER: &[u8] = &[0x00];

/// DNS standard query, recursion desired, `A IN example.com`.
const DNS_QUERY: &[u8] = &[
    0x52, 0x53, // transaction id
    0x01, 0x00, // flags: RD
    0x00, 0x01, // questions
    0x00, 0x00, // answers
    0x00, 0x00, // authority
    0x00, 0x00, // additional
    0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', //
    0x03, b'c', b'o', b'm', 0x00, //
    0x00, 0x01, // type A
    0x00, 0x01, // class IN
];

/// NTP header: LI 0, version 3, mode 3 (client); remaining 47 bytes zero.
const NTP_LI_VN_MODE: u8 = 0x1b;
const NTP_PACKET_LEN: usize = 48;

/// SNMPv1 GetRequest, community `public`, OID 1.3.6.1.2.1.1.1.0 (sysDescr).
const SNMP_GET_SYSDESCR: &[u8] = &[
    0x30, 0x29, // message
    0x02, 0x01, 0x00, // version 1
    0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
    0xa0, 0x1c, // GetRequest PDU
    0x02, 0x04, 0x52, 0x53, 0x43, 0x4e, // request id
    0x02, 0x01, 0x00, // error status
    0x02, 0x01, 0x00, // error index
    0x30, 0x0e, // varbind list
    0x30, 0x0c, // varbind
    0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, //
    0x05, 0x00, // NULL
];

const ISAKMP_HEADER_LEN: usize = 28;
const ISAKMP_SA_PAYLOAD_LEN: usize = 12;

/// Returns the payload to send to `port`.
///
/// Known ports get a protocol-shaped request (53 DNS, 123 NTP, 161 SNMP,
/// 500 IKE); everything else gets [`FILLER`].
#[must_use]
pub fn payload_for(port: u16) -> Vec<u8> {
    match port {
        53 => DNS_QUERY.to_vec(),
        123 => ntp_client_request(),
        161 => SNMP_GET_SYSDESCR.to_vec(),
        500 => ike_main_mode_blob(),
        _ => FILLER.to_vec(),
    }
}

fn ntp_client_request() -> Vec<u8> {
    let mut packet = vec![0u8; NTP_PACKET_LEN];
    packet[0] = NTP_LI_VN_MODE;
    packet
}

/// ISAKMP header with a random initiator cookie followed by an empty SA
/// payload. Enough for most IKE daemons to answer with a notify.
fn ike_main_mode_blob() -> Vec<u8> {
    let total = ISAKMP_HEADER_LEN + ISAKMP_SA_PAYLOAD_LEN;
    let mut packet = Vec::with_capacity(total);

    let mut initiator_cookie = [0u8; 8];
    rand::rng().fill_bytes(&mut initiator_cookie);

    packet.extend_from_slice(&initiator_cookie);
    packet.extend_from_slice(&[0u8; 8]); // responder cookie
    packet.push(0x01); // next payload: SA
    packet.push(0x10); // version 1.0
    packet.push(0x02); // exchange: identity protection
    packet.push(0x00); // flags
    packet.extend_from_slice(&[0u8; 4]); // message id
    packet.extend_from_slice(&(total as u32).to_be_bytes());

    packet.push(0x00); // next payload: none
    packet.push(0x00); // reserved
    packet.extend_from_slice(&(ISAKMP_SA_PAYLOAD_LEN as u16).to_be_bytes());
    packet.extend_from_slice(&1u32.to_be_bytes()); // DOI: IPsec
    packet.extend_from_slice(&1u32.to_be_bytes()); // situation: identity only

    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use parameterized::parameterized;

    #[parameterized(port = { 1, 22, 80, 137, 1900, 65535 })]
    fn unknown_ports_get_the_filler_byte(port: u16) {
        assert_eq!(payload_for(port), FILLER);
    }

    #[test]
    fn dns_query_has_one_question_and_a_terminated_name() {
        let payload = payload_for(53);
        assert_eq!(&payload[4..6], &[0x00, 0x01]);
        // qname terminator, then QTYPE A and QCLASS IN
        assert_eq!(&payload[payload.len() - 5..], &[0x00, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn ntp_request_is_a_client_mode_header() {
        let payload = payload_for(123);
        assert_eq!(payload.len(), 48);
        assert_eq!(payload[0] & 0x07, 3, "mode must be client");
        assert!(payload[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn snmp_lengths_are_consistent() {
        let payload = payload_for(161);
        assert_eq!(payload[0], 0x30);
        assert_eq!(usize::from(payload[1]), payload.len() - 2);
        // PDU length covers everything after its own header
        let pdu = payload.iter().position(|&b| b == 0xa0).unwrap();
        assert_eq!(usize::from(payload[pdu + 1]), payload.len() - pdu - 2);
    }

    #[test]
    fn ike_blob_declares_its_own_length() {
        let payload = payload_for(500);
        assert_eq!(payload.len(), 40);
        let declared = u32::from_be_bytes([payload[24], payload[25], payload[26], payload[27]]);
        assert_eq!(declared as usize, payload.len());
        assert_eq!(payload[17], 0x10);
    }

    #[test]
    fn ike_initiator_cookie_changes_between_calls() {
        // 2^-64 chance of a false failure
        assert_ne!(payload_for(500)[..8], payload_for(500)[..8]);
    }
}
