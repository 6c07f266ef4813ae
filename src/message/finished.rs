use nom::bytes::complete::take;

use crate::codec::parse_exact;
use crate::Error;

/// Finished. The length of `verify_data` depends on version and suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn decode(body: &[u8], verify_data_len: usize) -> Result<Finished, Error> {
        let data = parse_exact(body, take(verify_data_len))?;
        Ok(Finished {
            verify_data: data.to_vec(),
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.verify_data);
    }

    pub fn message_length(&self) -> usize {
        self.verify_data.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::arbitrary;

    #[test]
    fn roundtrip() {
        let verify_data: Vec<u8> = (0..12).collect();
        let parsed = Finished::decode(&verify_data, 12).unwrap();

        let mut out = Vec::new();
        parsed.serialize(&mut out);
        assert_eq!(out, verify_data);
    }

    #[test]
    fn randomized_roundtrip() {
        // SSL 3.0, TLS 1.0 to 1.2, and the TLS 1.3 hash lengths.
        let lengths = [36, 12, 32, 48];
        let mut rng = arbitrary::rng(0xF1);
        for _ in 0..arbitrary::ROUNDS {
            let len = arbitrary::pick(&mut rng, &lengths);
            let finished = Finished {
                verify_data: arbitrary::bytes(&mut rng, len..=len),
            };

            let mut out = Vec::new();
            finished.serialize(&mut out);
            assert_eq!(finished.message_length(), out.len());
            assert_eq!(Finished::decode(&out, len).unwrap(), finished);
        }
    }

    #[test]
    fn length_exactness() {
        let verify_data: Vec<u8> = (0..32).collect();
        assert!(Finished::decode(&verify_data[..31], 32).is_err());
        assert!(Finished::decode(&verify_data, 31).is_err());
    }
}
