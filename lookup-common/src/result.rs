use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Record types whose answers are addresses a name resolved to.
const ADDRESS_TYPES: [&str; 2] = ["A", "AAAA"];

/// Placeholder some modules emit for an answer without a presentable value.
const NIL_MARKER: &str = "<nil>";

/// Outcome of a single lookup. Status values are the statistics dimension of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    NoError,
    Error,
    ServFail,
    NxDomain,
    Refused,
    Timeout,
    Truncated,
    NoRecord,
    IllegalInput,
    /// The item was processed but must not appear in any output.
    NoOutput,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoError => "NOERROR",
            Status::Error => "ERROR",
            Status::ServFail => "SERVFAIL",
            Status::NxDomain => "NXDOMAIN",
            Status::Refused => "REFUSED",
            Status::Timeout => "TIMEOUT",
            Status::Truncated => "TRUNCATED",
            Status::NoRecord => "NORECORD",
            Status::IllegalInput => "ILLEGAL_INPUT",
            Status::NoOutput => "NO_OUTPUT",
        }
    }

    /// Whether a result carrying this status is withheld from every sink.
    pub fn is_suppressed(&self) -> bool {
        *self == Status::NoOutput
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0} is not a valid Status")]
pub struct ParseStatusError(String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_ref() {
            "NOERROR" => Ok(Status::NoError),
            "ERROR" => Ok(Status::Error),
            "SERVFAIL" => Ok(Status::ServFail),
            "NXDOMAIN" => Ok(Status::NxDomain),
            "REFUSED" => Ok(Status::Refused),
            "TIMEOUT" => Ok(Status::Timeout),
            "TRUNCATED" => Ok(Status::Truncated),
            "NORECORD" => Ok(Status::NoRecord),
            "ILLEGAL_INPUT" => Ok(Status::IllegalInput),
            "NO_OUTPUT" => Ok(Status::NoOutput),
            invalid => Err(ParseStatusError(invalid.to_owned())),
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Status::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Allow-list of record types for the filtered output stream.
/// The `ANY` entry admits every record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter(BTreeSet<String>);

impl OutputFilter {
    pub const WILDCARD: &'static str = "ANY";

    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        OutputFilter(
            types
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allows(&self, record_type: &str) -> bool {
        self.0.contains(Self::WILDCARD) || self.0.contains(record_type)
    }
}

impl FromStr for OutputFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OutputFilter::new(s.split(',')))
    }
}

impl Serialize for OutputFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

fn is_displayable(value: &str) -> bool {
    !value.is_empty() && value != NIL_MARKER
}

/// A single resource record from a DNS answer, in presentation form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: u32,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub answer: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Answer {
    pub fn new(name: &str, record_type: &str, answer: &str) -> Self {
        Answer {
            ttl: 0,
            record_type: record_type.to_owned(),
            class: "IN".to_owned(),
            name: name.to_owned(),
            answer: answer.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxAnswer {
    #[serde(flatten)]
    pub answer: Answer,
    pub preference: u16,
}

/// Entries of an answer section. Modules may emit shapes the core has no model for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerRecord {
    Mx(MxAnswer),
    Plain(Answer),
    Unknown(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsFlags {
    pub response: bool,
    pub opcode: i32,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub authenticated: bool,
    pub checking_disabled: bool,
    pub error_code: i32,
}

/// The full multi-section answer set of a generic DNS lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenericResult {
    pub answers: Vec<AnswerRecord>,
    #[serde(rename = "additionals")]
    pub additional: Vec<AnswerRecord>,
    pub authorities: Vec<AnswerRecord>,
    pub protocol: String,
    pub flags: DnsFlags,
}

/// The addresses a name resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSetResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv4_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6_addresses: Vec<String>,
}

impl AddressSetResult {
    /// Addresses paired with the record type they were answered as, IPv4 first.
    pub fn typed_addresses(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.ipv4_addresses
            .iter()
            .map(|a| ("A", a.as_str()))
            .chain(self.ipv6_addresses.iter().map(|a| ("AAAA", a.as_str())))
    }
}

/// Raised when a payload does not support one of the projections the derived sinks need.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("{projection} is not available for {kind} payloads")]
pub struct UnsupportedPayload {
    pub projection: &'static str,
    pub kind: &'static str,
}

/// A (key, member) pair destined for the deduplicating store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePair {
    pub key: String,
    pub member: String,
}

impl StorePair {
    pub fn new(key: &str, member: &str) -> Self {
        StorePair {
            key: key.to_owned(),
            member: member.to_owned(),
        }
    }
}

/// Module-specific payload of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModuleData {
    Generic(GenericResult),
    AddressSet(AddressSetResult),
    /// A module shape the core does not know how to project. Still written to the primary sink.
    Other(Value),
}

impl ModuleData {
    pub fn kind(&self) -> &'static str {
        match self {
            ModuleData::Generic(_) => "generic",
            ModuleData::AddressSet(_) => "address-set",
            ModuleData::Other(_) => "unrecognized",
        }
    }

    /// The first displayable value whose record type passes `filter`.
    pub fn best_value(&self, filter: &OutputFilter) -> Result<Option<&str>, UnsupportedPayload> {
        match self {
            ModuleData::Generic(result) => Ok(result
                .answers
                .iter()
                .filter_map(|record| match record {
                    AnswerRecord::Plain(answer) => Some(answer),
                    _ => None,
                })
                .find(|answer| filter.allows(&answer.record_type) && is_displayable(&answer.answer))
                .map(|answer| answer.answer.as_str())),
            ModuleData::AddressSet(result) => Ok(result
                .typed_addresses()
                .find(|(record_type, value)| filter.allows(record_type) && is_displayable(value))
                .map(|(_, value)| value)),
            ModuleData::Other(_) => Err(UnsupportedPayload {
                projection: "best value",
                kind: self.kind(),
            }),
        }
    }

    /// Every (key, member) pair the payload contributes to the deduplicating store.
    /// `queried_name` is the member for payloads that do not carry owner names.
    pub fn store_pairs(&self, queried_name: &str) -> Result<Vec<StorePair>, UnsupportedPayload> {
        match self {
            ModuleData::Generic(result) => {
                let mut pairs = Vec::new();
                for record in &result.answers {
                    match record {
                        AnswerRecord::Plain(answer) => {
                            if ADDRESS_TYPES.contains(&answer.record_type.as_str()) {
                                pairs.push(StorePair::new(&answer.answer, &answer.name));
                            }
                        }
                        AnswerRecord::Mx(mx) => {
                            pairs.push(StorePair::new(&mx.answer.answer, &mx.answer.name));
                        }
                        AnswerRecord::Unknown(_) => {
                            warn!("unimplemented answer type, skipping it for the store");
                        }
                    }
                }
                Ok(pairs)
            }
            ModuleData::AddressSet(result) => Ok(result
                .typed_addresses()
                .map(|(_, address)| StorePair::new(address, queried_name))
                .collect()),
            ModuleData::Other(_) => Err(UnsupportedPayload {
                projection: "store extraction",
                kind: self.kind(),
            }),
        }
    }
}

/// One processed input item, as written to the primary output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altered_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alexa_rank: Option<i64>,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    pub status: Status,
    pub data: Option<ModuleData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl LookupResult {
    pub fn best_value(&self, filter: &OutputFilter) -> Result<Option<&str>, UnsupportedPayload> {
        match &self.data {
            Some(data) => data.best_value(filter),
            None => Ok(None),
        }
    }

    pub fn store_pairs(&self) -> Result<Vec<StorePair>, UnsupportedPayload> {
        match &self.data {
            Some(data) => data.store_pairs(&self.name),
            None => Ok(Vec::new()),
        }
    }
}
