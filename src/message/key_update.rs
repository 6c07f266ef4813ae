use crate::Error;

/// KeyUpdate (RFC 8446 4.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdate {
    UpdateNotRequested,
    UpdateRequested,
}

impl KeyUpdate {
    pub fn decode(body: &[u8]) -> Result<KeyUpdate, Error> {
        match body {
            [0] => Ok(KeyUpdate::UpdateNotRequested),
            [1] => Ok(KeyUpdate::UpdateRequested),
            [_] => Err(Error::illegal("KeyUpdate request value")),
            _ => Err(Error::decode("KeyUpdate must be one byte")),
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(match self {
            KeyUpdate::UpdateNotRequested => 0,
            KeyUpdate::UpdateRequested => 1,
        });
    }

    pub fn message_length(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertDescription;

    #[test]
    fn values() {
        assert_eq!(KeyUpdate::decode(&[1]).unwrap(), KeyUpdate::UpdateRequested);
        let mut out = Vec::new();
        KeyUpdate::UpdateNotRequested.serialize(&mut out);
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn every_request_value() {
        for value in 0..=u8::MAX {
            match KeyUpdate::decode(&[value]) {
                Ok(m) => {
                    let mut out = Vec::new();
                    m.serialize(&mut out);
                    assert_eq!(out, [value]);
                    assert_eq!(m.message_length(), out.len());
                }
                Err(e) => {
                    assert!(value > 1);
                    assert_eq!(e.alert(), AlertDescription::IllegalParameter);
                }
            }
        }
    }

    #[test]
    fn bad_values() {
        assert_eq!(
            KeyUpdate::decode(&[2]).unwrap_err().alert(),
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            KeyUpdate::decode(&[0, 0]).unwrap_err().alert(),
            AlertDescription::DecodeError
        );
        assert!(KeyUpdate::decode(&[]).is_err());
    }
}
