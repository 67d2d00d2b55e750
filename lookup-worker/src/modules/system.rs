//! Address lookups through the operating system resolver.
use std::collections::BTreeSet;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use lookup_common::input::ZoneRecord;
use lookup_common::lookup::{Lookup, LookupError, LookupModule, LookupOutcome, RoutineFactory};
use lookup_common::result::{AddressSetResult, ModuleData, Status};
use tracing::debug;

pub const SYSTEM_MODULE: &str = "system";

/// Fragments of resolver error messages that mean the name does not exist.
const NX_DOMAIN_MESSAGES: [&str; 3] = [
    "not known",
    "No address associated",
    "nodename nor servname",
];

pub struct SystemLookupModule {
    timeout: Duration,
    retries: u32,
}

impl SystemLookupModule {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }
}

impl LookupModule for SystemLookupModule {
    fn make_routine_factory(
        &self,
        thread_id: usize,
    ) -> Result<Box<dyn RoutineFactory>, LookupError> {
        if self.timeout.is_zero() {
            return Err(LookupError::RoutineFactory {
                thread_id,
                reason: "lookup timeout must be positive".to_owned(),
            });
        }

        Ok(Box::new(SystemRoutineFactory {
            timeout: self.timeout,
            retries: self.retries,
        }))
    }
}

struct SystemRoutineFactory {
    timeout: Duration,
    retries: u32,
}

impl RoutineFactory for SystemRoutineFactory {
    fn make_lookup(&mut self) -> Result<Box<dyn Lookup>, LookupError> {
        Ok(Box::new(SystemLookup {
            timeout: self.timeout,
            retries: self.retries,
        }))
    }
}

struct SystemLookup {
    timeout: Duration,
    retries: u32,
}

impl SystemLookup {
    async fn resolve(&self, name: &str) -> Result<Vec<IpAddr>, LookupOutcome> {
        let mut attempt = 0;
        loop {
            match tokio::time::timeout(self.timeout, tokio::net::lookup_host((name, 0))).await {
                Ok(Ok(addrs)) => return Ok(addrs.map(|addr| addr.ip()).collect()),
                Ok(Err(e)) => {
                    return Err(LookupOutcome::new(classify_resolver_error(&e)).error(&e.to_string()))
                }
                Err(_) if attempt < self.retries => {
                    attempt += 1;
                    debug!(name, attempt, "lookup timed out, retrying");
                }
                Err(_) => {
                    return Err(LookupOutcome::new(Status::Timeout).error(&format!(
                        "no answer within {}ms",
                        self.timeout.as_millis()
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl Lookup for SystemLookup {
    async fn do_lookup(&mut self, name: &str) -> LookupOutcome {
        if name.is_empty() {
            return LookupOutcome::new(Status::IllegalInput).error("empty name");
        }

        match self.resolve(name).await {
            Ok(addrs) => address_outcome(addrs),
            Err(outcome) => outcome,
        }
    }

    async fn do_zonefile_lookup(&mut self, record: &ZoneRecord) -> LookupOutcome {
        self.do_lookup(record.owner_name()).await
    }
}

fn address_outcome(addrs: Vec<IpAddr>) -> LookupOutcome {
    let mut ipv4 = BTreeSet::new();
    let mut ipv6 = BTreeSet::new();
    for addr in addrs {
        match addr {
            IpAddr::V4(v4) => ipv4.insert(v4.to_string()),
            IpAddr::V6(v6) => ipv6.insert(v6.to_string()),
        };
    }

    if ipv4.is_empty() && ipv6.is_empty() {
        return LookupOutcome::new(Status::NoRecord);
    }

    LookupOutcome::new(Status::NoError).data(ModuleData::AddressSet(AddressSetResult {
        ipv4_addresses: ipv4.into_iter().collect(),
        ipv6_addresses: ipv6.into_iter().collect(),
    }))
}

fn classify_resolver_error(error: &io::Error) -> Status {
    let message = error.to_string();
    if NX_DOMAIN_MESSAGES
        .iter()
        .any(|fragment| message.contains(fragment))
    {
        Status::NxDomain
    } else {
        Status::Error
    }
}

#[cfg(test)]
mod tests {
    use lookup_common::input::ZoneRecordData;

    use super::*;

    fn lookup() -> Box<dyn Lookup> {
        SystemLookupModule::new(Duration::from_secs(5), 1)
            .make_routine_factory(0)
            .unwrap()
            .make_lookup()
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolves_address_literals() {
        let outcome = lookup().do_lookup("127.0.0.1").await;
        assert_eq!(outcome.status, Status::NoError);
        assert_eq!(
            outcome.data,
            Some(ModuleData::AddressSet(AddressSetResult {
                ipv4_addresses: vec!["127.0.0.1".to_owned()],
                ipv6_addresses: vec![],
            }))
        );

        let outcome = lookup().do_lookup("::1").await;
        assert_eq!(outcome.status, Status::NoError);
    }

    #[tokio::test]
    async fn test_empty_name_is_illegal() {
        let outcome = lookup().do_lookup("").await;
        assert_eq!(outcome.status, Status::IllegalInput);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_zone_record_resolves_owner() {
        let record = ZoneRecord {
            owner: "127.0.0.1.".to_owned(),
            ttl: None,
            class: None,
            data: ZoneRecordData::Other {
                record_type: "A".to_owned(),
                rdata: String::new(),
            },
        };
        let outcome = lookup().do_zonefile_lookup(&record).await;
        assert_eq!(outcome.status, Status::NoError);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let module = SystemLookupModule::new(Duration::ZERO, 0);
        assert!(matches!(
            module.make_routine_factory(3),
            Err(LookupError::RoutineFactory { thread_id: 3, .. })
        ));
    }

    #[test]
    fn test_classify_resolver_error() {
        let nx = io::Error::new(
            io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        );
        assert_eq!(classify_resolver_error(&nx), Status::NxDomain);

        let other = io::Error::new(io::ErrorKind::Other, "Temporary failure in name resolution");
        assert_eq!(classify_resolver_error(&other), Status::Error);
    }
}
