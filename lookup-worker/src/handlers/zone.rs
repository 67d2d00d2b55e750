//! Zone-file input, scanned with `domain`'s in-place zone file scanner.
//!
//! The scanner needs the whole file in memory. `$ORIGIN` and `$TTL` are applied by the
//! scanner, `$INCLUDE` is skipped.
use domain::base::name::ToName;
use domain::rdata::ZoneRecordData as RecordData;
use domain::zonefile::inplace::{Entry, ScannedRecord, Zonefile};
use lookup_common::handlers::HandlerError;
use lookup_common::input::{ZoneRecord, ZoneRecordData};
use tracing::warn;

pub struct ZoneReader {
    zonefile: Zonefile,
}

impl ZoneReader {
    pub fn new(data: &[u8]) -> Self {
        Self {
            zonefile: Zonefile::from(data),
        }
    }

    /// The next record of the zone, or `None` once the zone is exhausted.
    pub fn next_record(&mut self) -> Result<Option<ZoneRecord>, HandlerError> {
        loop {
            let entry = self
                .zonefile
                .next_entry()
                .map_err(|e| HandlerError::MalformedInput(e.to_string()))?;

            match entry {
                Some(Entry::Record(record)) => return Ok(Some(convert(&record))),
                Some(Entry::Include { path, .. }) => {
                    warn!(path = %path, "skipping $INCLUDE directive")
                }
                None => return Ok(None),
            }
        }
    }
}

fn convert(record: &ScannedRecord) -> ZoneRecord {
    let data = match record.data() {
        RecordData::Ns(ns) => ZoneRecordData::Ns {
            nameserver: absolute(ns.nsdname()),
        },
        other => ZoneRecordData::Other {
            record_type: record.rtype().to_string(),
            rdata: other.to_string(),
        },
    };

    ZoneRecord {
        owner: absolute(record.owner()),
        ttl: Some(record.ttl().as_secs()),
        class: Some(record.class().to_string()),
        data,
    }
}

/// Presentation format with the trailing dot. The root is just `.`.
fn absolute(name: &impl ToName) -> String {
    let name = name.to_bytes();
    if name.is_root() {
        ".".to_owned()
    } else {
        format!("{}.", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(zone: &str) -> Result<Vec<ZoneRecord>, HandlerError> {
        let mut reader = ZoneReader::new(zone.as_bytes());
        let mut records = Vec::new();
        while let Some(record) = reader.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    fn rdata(record: &ZoneRecord) -> &str {
        match &record.data {
            ZoneRecordData::Other { rdata, .. } => rdata,
            ZoneRecordData::Ns { .. } => panic!("expected opaque record data"),
        }
    }

    #[test]
    fn test_parses_delegations() {
        let zone = "\
$ORIGIN com.
$TTL 172800
; delegations
example  IN NS a.iana-servers.net.
         IN 86400 NS ns2 ; relative
@ 900 IN SOA a.gtld-servers.net. nstld.verisign-grs.com. (
    1700000000 ; serial
    1800 900 604800 86400 )

";
        let records = parse(zone).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].owner, "example.com.");
        assert_eq!(records[0].ttl, Some(172800));
        assert_eq!(records[0].class.as_deref(), Some("IN"));
        assert_eq!(
            records[0].nameserver().as_deref(),
            Some("a.iana-servers.net")
        );

        assert_eq!(records[1].owner, "example.com.");
        assert_eq!(records[1].ttl, Some(86400));
        assert_eq!(records[1].nameserver().as_deref(), Some("ns2.com"));

        assert_eq!(records[2].owner, "com.");
        assert_eq!(records[2].record_type(), "SOA");
        assert!(rdata(&records[2]).contains("1700000000"));
    }

    #[test]
    fn test_root_origin() {
        let records = parse("$ORIGIN .\nnet 3600 IN NS a.gtld-servers.net.\n").unwrap();
        assert_eq!(records[0].owner, "net.");
        assert_eq!(records[0].owner_name(), "net");
        assert_eq!(records[0].ttl, Some(3600));
    }

    #[test]
    fn test_quoted_text_is_kept() {
        let records = parse(
            "\
txt.example. 300 IN TXT \"smile :)\"
             300 IN TXT \"v=spf1; -all\"
             300 IN TXT \"a   b\"
",
        )
        .unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].record_type(), "TXT");
        assert!(rdata(&records[0]).contains("smile :)"));
        assert!(rdata(&records[1]).contains("v=spf1; -all"));
        assert!(rdata(&records[2]).contains("a   b"));
    }

    #[test]
    fn test_include_is_skipped() {
        let records = parse(
            "$ORIGIN org.\n$INCLUDE other.zone\nexample 3600 IN NS ns1.example.org.\n",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "example.org.");
    }

    #[test]
    fn test_malformed_zones() {
        // relative owner without an origin
        assert!(matches!(
            parse("www 300 IN A 192.0.2.1\n"),
            Err(HandlerError::MalformedInput(_))
        ));
        assert!(matches!(
            parse("example.com. 300 IN\n"),
            Err(HandlerError::MalformedInput(_))
        ));
        assert!(matches!(
            parse("example.com. 300 IN SOA a. b. (\n 1 2 3\n"),
            Err(HandlerError::MalformedInput(_))
        ));
    }
}
