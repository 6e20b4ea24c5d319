//! Bet record and its text encodings

use std::fmt;

use crate::error::{ClientError, Result};
use crate::protocol::{CSV_DELIMITER, MAX_RECORD_LEN, WIRE_DELIMITER};

const WIRE_FIELDS: usize = 6;
const CSV_FIELDS: usize = 5;

/// A single wager placed at an agency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetRecord {
    pub agency_id: String,
    pub first_name: String,
    pub last_name: String,
    /// National ID of the bettor
    pub document: u64,
    /// Kept as provided; never parsed
    pub birth_date: String,
    pub number: u32,
}

impl BetRecord {
    /// Encode as `agency;first;last;document;birth;number`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let text = format!(
            "{agency}{d}{first}{d}{last}{d}{document}{d}{birth}{d}{number}",
            agency = self.agency_id,
            first = self.first_name,
            last = self.last_name,
            document = self.document,
            birth = self.birth_date,
            number = self.number,
            d = WIRE_DELIMITER,
        );

        if text.len() > MAX_RECORD_LEN {
            return Err(ClientError::EncodingTooLarge {
                len: text.len(),
                max: MAX_RECORD_LEN,
            });
        }

        Ok(text.into_bytes())
    }

    /// Decode a record received from the server
    pub fn decode_wire(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ClientError::MalformedFrame(format!("record is not UTF-8: {}", e)))?;

        let fields: Vec<&str> = text.split(WIRE_DELIMITER).collect();
        if fields.len() != WIRE_FIELDS {
            return Err(ClientError::MalformedFrame(format!(
                "expected {} fields, got {}: {:?}",
                WIRE_FIELDS,
                fields.len(),
                text
            )));
        }

        let document = fields[3].parse().map_err(|e| {
            ClientError::MalformedFrame(format!("invalid document {:?}: {}", fields[3], e))
        })?;
        let number = fields[5].parse().map_err(|e| {
            ClientError::MalformedFrame(format!("invalid number {:?}: {}", fields[5], e))
        })?;

        Ok(Self {
            agency_id: fields[0].to_string(),
            first_name: fields[1].to_string(),
            last_name: fields[2].to_string(),
            document,
            birth_date: fields[4].to_string(),
            number,
        })
    }

    /// Decode one line of the bets file (`first,last,document,birth,number`)
    pub fn decode_csv(agency_id: &str, line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(CSV_DELIMITER).collect();
        if fields.len() != CSV_FIELDS {
            return Err(ClientError::MalformedRecord(format!(
                "expected {} fields, got {}: {:?}",
                CSV_FIELDS,
                fields.len(),
                line
            )));
        }

        // The wire format has no escaping
        if agency_id.contains(WIRE_DELIMITER) || fields.iter().any(|f| f.contains(WIRE_DELIMITER)) {
            return Err(ClientError::MalformedRecord(format!(
                "field contains {:?}: {:?}",
                WIRE_DELIMITER, line
            )));
        }

        let document = fields[2].parse().map_err(|e| {
            ClientError::MalformedRecord(format!("invalid document {:?}: {}", fields[2], e))
        })?;
        let number = fields[4].parse().map_err(|e| {
            ClientError::MalformedRecord(format!("invalid number {:?}: {}", fields[4], e))
        })?;

        Ok(Self {
            agency_id: agency_id.to_string(),
            first_name: fields[0].to_string(),
            last_name: fields[1].to_string(),
            document,
            birth_date: fields[3].to_string(),
            number,
        })
    }
}

impl fmt::Display for BetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(document: {} | number: {})", self.document, self.number)
    }
}
