use serde::{Deserialize, Deserializer, Serialize, de};

use crate::errors::Error;
#[cfg(feature = "fs")]
use std::{fs::File, io::BufReader};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallsignEntry {
    /// Three-letter ICAO designator, e.g. `PAL`.
    pub icao: String,
    /// Spoken telephony designator, e.g. `Philippine`.
    #[serde(default, deserialize_with = "deserialize_option_string")]
    pub telephony: Option<String>,
    pub operator: String,
    #[serde(default)]
    pub country: String,
    #[serde(default = "default_active", deserialize_with = "deserialize_bool")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CallsignEntry {
    pub fn new(icao: &str, telephony: &str, operator: &str, country: &str) -> Self {
        Self {
            icao: icao.to_owned(),
            telephony: Some(telephony.to_owned()),
            operator: operator.to_owned(),
            country: country.to_owned(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallsignTable(pub Vec<CallsignEntry>);

impl CallsignTable {
    pub fn load_callsigns<R>(reader: R) -> Result<Self, Error>
    where
        R: std::io::Read,
    {
        let res = serde_json::from_reader(reader)?;
        Ok(res)
    }

    #[cfg(feature = "fs")]
    pub fn load_callsigns_from_file() -> Result<Self, Error> {
        let file = File::open(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/resources/known-strings/callsigns.json"
        ))?;
        let reader = BufReader::new(file);
        Self::load_callsigns(reader)
    }

    pub fn active(&self) -> impl Iterator<Item = &CallsignEntry> {
        self.0
            .iter()
            .filter(|entry| entry.active && !entry.icao.is_empty())
    }

    /// Upper-case ICAO designators of all active operators.
    pub fn prefixes(&self) -> Vec<String> {
        self.active().map(|entry| entry.icao.to_uppercase()).collect()
    }

    /// Maps a spoken telephony designator ("Philippine") to its ICAO prefix ("PAL").
    pub fn icao_for_telephony(&self, telephony: &str) -> Option<&str> {
        let key = telephony.to_lowercase().replace(' ', "");
        self.active()
            .find(|entry| {
                entry
                    .telephony
                    .as_ref()
                    .is_some_and(|t| t.to_lowercase().replace(' ', "") == key)
            })
            .map(|entry| entry.icao.as_str())
    }

    pub fn builtin() -> Self {
        CallsignTable(vec![
            CallsignEntry::new("PAL", "Philippine", "Philippine Airlines", "Philippines"),
            CallsignEntry::new("CEB", "Cebu", "Cebu Pacific", "Philippines"),
            CallsignEntry::new("APG", "Air Philippines", "PAL Express", "Philippines"),
            CallsignEntry::new("SRQ", "Blue Jay", "Cebgo", "Philippines"),
            CallsignEntry::new("AXF", "Asian Express", "Royal Air Philippines", "Philippines"),
            CallsignEntry::new("SIA", "Singapore", "Singapore Airlines", "Singapore"),
            CallsignEntry::new("CPA", "Cathay", "Cathay Pacific", "Hong Kong"),
            CallsignEntry::new("KAL", "Koreanair", "Korean Air", "South Korea"),
            CallsignEntry::new("JAL", "Japanair", "Japan Airlines", "Japan"),
            CallsignEntry::new("UAE", "Emirates", "Emirates", "United Arab Emirates"),
            CallsignEntry::new("DLH", "Lufthansa", "Lufthansa", "Germany"),
            CallsignEntry::new("DAL", "Delta", "Delta Air Lines", "United States"),
        ])
    }
}

fn deserialize_option_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(d)?;
    let res = s.filter(|s| !s.is_empty() && s != "\\N");
    Ok(res)
}

fn deserialize_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    let res = match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => match s.as_str() {
            "N" | "n" => false,
            "Y" | "y" => true,
            _ => {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Str(&s),
                    &r#""Y" or "N""#,
                ));
            }
        },
    };
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_reader() {
        let json = r#"[
            {"icao": "PAL", "telephony": "Philippine", "operator": "Philippine Airlines", "active": "Y"},
            {"icao": "XXX", "telephony": "", "operator": "Defunct", "active": "N"}
        ]"#;
        let table = CallsignTable::load_callsigns(json.as_bytes()).unwrap();
        assert_eq!(table.0.len(), 2);
        assert_eq!(table.0[1].telephony, None);
        assert_eq!(table.prefixes(), vec!["PAL".to_string()]);
    }

    #[test]
    fn test_bad_active_flag_rejected() {
        let json = r#"[{"icao": "PAL", "operator": "Philippine Airlines", "active": "maybe"}]"#;
        assert!(CallsignTable::load_callsigns(json.as_bytes()).is_err());
    }

    #[test]
    fn test_telephony_lookup() {
        let table = CallsignTable::builtin();
        assert_eq!(table.icao_for_telephony("philippine"), Some("PAL"));
        assert_eq!(table.icao_for_telephony("Air Philippines"), Some("APG"));
        assert_eq!(table.icao_for_telephony("Speedbird"), None);
    }

    #[cfg(feature = "fs")]
    #[test]
    fn test_load_from_file() {
        let table = CallsignTable::load_callsigns_from_file().unwrap();
        assert!(table.prefixes().contains(&"CEB".to_string()));
    }
}
