//! 批量导入导出服务
//!
//! 行格式：
//! `domain|port|is_disable|sort_order|forward_domain|ip|isp|is_ban|weight|forward_sort|record_type`

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use dns_failover_provider::normalize_domain_name;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::services::domain_service::{DomainService, validate_hostname};
use crate::types::{
    Domain, Forward, IMPORT_FIELDS, ImportDomain, ImportForward, ImportRecord, ImportSummary,
    NewDomain, NewForward, RecordKind,
};

fn line_error(line: usize, message: impl Into<String>) -> CoreError {
    CoreError::ImportError {
        line,
        message: message.into(),
    }
}

fn check_hostname(name: &str, field: &str, line: usize) -> CoreResult<()> {
    validate_hostname(name).map_err(|e| match e {
        CoreError::ValidationError(message) => line_error(line, format!("{field}: {message}")),
        other => other,
    })
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str, line: usize) -> CoreResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| line_error(line, format!("{field} is not a valid number: '{}'", value.trim())))
}

/// Parse every line, or reject the whole batch at the first bad line.
pub fn parse_import(text: &str) -> CoreResult<Vec<ImportRecord>> {
    let mut records = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = raw.split('|').map(str::trim).collect();
        if fields.len() < IMPORT_FIELDS {
            return Err(line_error(
                line,
                format!("expected {IMPORT_FIELDS} fields, got {}", fields.len()),
            ));
        }

        let domain = normalize_domain_name(fields[0]);
        check_hostname(&domain, "domain", line)?;
        let port: u16 = parse_number(fields[1], "port", line)?;
        if port == 0 {
            return Err(line_error(line, "port must be 1-65535"));
        }
        let forward_domain = normalize_domain_name(fields[4]);
        check_hostname(&forward_domain, "forward domain", line)?;
        let record_type = if fields[10].is_empty() {
            RecordKind::A
        } else {
            fields[10].parse::<RecordKind>().map_err(|_| {
                line_error(line, format!("record type must be A or CNAME, got '{}'", fields[10]))
            })?
        };

        records.push(ImportRecord {
            line,
            domain,
            port,
            is_disable_check: parse_bool(fields[2]),
            sort_order: parse_number(fields[3], "sort_order", line)?,
            forward_domain,
            ip: fields[5].to_string(),
            isp: fields[6].to_string(),
            is_ban: parse_bool(fields[7]),
            weight: parse_number(fields[8], "weight", line)?,
            forward_sort: parse_number(fields[9], "forward_sort", line)?,
            record_type,
        });
    }

    Ok(records)
}

/// Merge rows by `domain:port`, keeping first-seen order. Domain-level
/// fields come from the first row of each group.
#[must_use]
pub fn group_records(records: Vec<ImportRecord>) -> Vec<ImportDomain> {
    let mut groups: Vec<ImportDomain> = Vec::new();
    for record in records {
        let forward = ImportForward {
            forward_domain: record.forward_domain,
            ip: record.ip,
            isp: record.isp,
            is_ban: record.is_ban,
            weight: record.weight,
            sort_order: record.forward_sort,
            record_type: record.record_type,
        };
        match groups
            .iter_mut()
            .find(|g| g.domain == record.domain && g.port == record.port)
        {
            Some(group) => group.forwards.push(forward),
            None => groups.push(ImportDomain {
                domain: record.domain,
                port: record.port,
                is_disable_check: record.is_disable_check,
                sort_order: record.sort_order,
                forwards: vec![forward],
            }),
        }
    }
    groups
}

/// One export line for a forward under its domain.
#[must_use]
pub fn format_export_line(domain: &Domain, forward: &Forward) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        domain.domain,
        domain.port,
        domain.is_disable_check,
        domain.sort_order,
        forward.forward_domain,
        forward.ip,
        forward.isp,
        forward.is_ban,
        forward.weight,
        forward.sort_order,
        forward.record_type
    )
}

/// 批量导入导出服务
pub struct ImportExportService {
    ctx: Arc<ServiceContext>,
    domains: DomainService,
}

impl ImportExportService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let domains = DomainService::new(ctx.clone());
        Self { ctx, domains }
    }

    /// Import a batch. Nothing is written unless every line parses.
    pub async fn import(&self, text: &str) -> CoreResult<ImportSummary> {
        let groups = group_records(parse_import(text)?);
        if groups.is_empty() {
            return Err(CoreError::ValidationError(
                "no import lines found".to_string(),
            ));
        }

        let mut summary = ImportSummary::default();
        for group in groups {
            let domain = self.save_domain(&group, &mut summary).await?;

            let mut known: HashSet<String> = self
                .ctx
                .domain_repository
                .list_forwards(domain.id)
                .await?
                .into_iter()
                .map(|f| f.forward_domain)
                .collect();

            for forward in group.forwards {
                if !known.insert(forward.forward_domain.clone()) {
                    log::debug!(
                        "Forward {} already under {}, skipped",
                        forward.forward_domain,
                        domain.address()
                    );
                    summary.forwards_skipped += 1;
                    continue;
                }
                let new_forward = NewForward {
                    domain_id: domain.id,
                    forward_domain: forward.forward_domain,
                    ip: forward.ip,
                    isp: forward.isp,
                    is_ban: forward.is_ban,
                    // imported bans carry no expiry
                    ban_until: None,
                    weight: forward.weight,
                    sort_order: forward.sort_order,
                    record_type: forward.record_type,
                };
                self.ctx.domain_repository.insert_forward(&new_forward).await?;
                summary.forwards_added += 1;
            }
        }

        log::info!(
            "Import finished: {} domains created, {} updated, {} forwards added, {} skipped",
            summary.domains_created,
            summary.domains_updated,
            summary.forwards_added,
            summary.forwards_skipped
        );
        Ok(summary)
    }

    async fn save_domain(
        &self,
        group: &ImportDomain,
        summary: &mut ImportSummary,
    ) -> CoreResult<Domain> {
        let target = match self.domains.lookup_dns_target(&group.domain).await {
            Ok(ids) => Some(ids),
            Err(reason) => {
                log::warn!("Import: {reason}");
                None
            }
        };

        let existing = self
            .ctx
            .domain_repository
            .find_domain_by_name_port(&group.domain, group.port)
            .await?;

        if let Some(mut domain) = existing {
            domain.is_disable_check = group.is_disable_check;
            domain.sort_order = group.sort_order;
            if let Some((zone_id, record_id)) = target {
                domain.zone_id = zone_id;
                domain.record_id = record_id;
            }
            self.ctx.domain_repository.update_domain(&domain).await?;
            summary.domains_updated += 1;
            return Ok(domain);
        }

        let (zone_id, record_id) = target.unwrap_or_default();
        let domain = self
            .ctx
            .domain_repository
            .insert_domain(&NewDomain {
                domain: group.domain.clone(),
                port: group.port,
                record_id,
                zone_id,
                is_disable_check: group.is_disable_check,
                sort_order: group.sort_order,
            })
            .await?;
        summary.domains_created += 1;
        Ok(domain)
    }

    /// Every forward as one line, domains by `sort_order`, forwards in selector order.
    pub async fn export(&self) -> CoreResult<String> {
        let mut out = String::new();
        for domain in self.ctx.domain_repository.list_domains().await? {
            for forward in self.ctx.domain_repository.list_forwards(domain.id).await? {
                let _ = writeln!(out, "{}", format_export_line(&domain, &forward));
            }
        }
        if out.is_empty() {
            return Err(CoreError::ExportEmpty);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_harness, seed_domain, seed_forward};

    const BATCH: &str = "\
# domain|port|is_disable|sort|forward|ip|isp|is_ban|weight|forward_sort|type
api.example.com|443|false|1|edge-1.example.net|1.2.3.4|CT|false|10|0|A

api.example.com|443|false|1|cdn.example.net||CU|TRUE|5|1|CNAME
static.example.com|80|True|2|edge-2.example.net|5.6.7.8|CM|false|0|0|
";

    #[test]
    fn parses_and_groups() {
        let records = parse_import(BATCH).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].line, 2);
        assert!(records[1].is_ban);
        assert_eq!(records[1].record_type, RecordKind::Cname);
        assert!(records[2].is_disable_check);
        assert_eq!(records[2].record_type, RecordKind::A);

        let groups = group_records(records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].forwards.len(), 2);
        assert_eq!(groups[1].domain, "static.example.com");
    }

    #[test]
    fn bad_line_reports_its_number() {
        let text = "api.example.com|443|false|1|edge.example.net|1.2.3.4|CT|false|10|0|A\n\
                    api.example.com|https|false|1|edge.example.net|1.2.3.4|CT|false|10|0|A";
        assert!(matches!(
            parse_import(text),
            Err(CoreError::ImportError { line: 2, .. })
        ));

        assert!(matches!(
            parse_import("too|few|fields"),
            Err(CoreError::ImportError { line: 1, .. })
        ));
        assert!(matches!(
            parse_import("a.com|80|false|1|f.net|ip|isp|false|10|0|MX"),
            Err(CoreError::ImportError { line: 1, .. })
        ));
    }

    #[test]
    fn malformed_names_are_rejected() {
        let spaced = "ok.example.com|443|false|1|edge.example.net|1.2.3.4|CT|false|10|0|A\n\
                      a b.com|443|false|1|edge.example.net|1.2.3.4|CT|false|10|0|A";
        match parse_import(spaced) {
            Err(CoreError::ImportError { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.starts_with("domain: "), "{message}");
            }
            other => panic!("expected import error, got {other:?}"),
        }

        let slashed = "a.com|443|false|1|edge.example.net/x|1.2.3.4|CT|false|10|0|A";
        assert!(matches!(
            parse_import(slashed),
            Err(CoreError::ImportError { line: 1, .. })
        ));
        assert!(matches!(
            parse_import("a.com|443|false|1||1.2.3.4|CT|false|10|0|A"),
            Err(CoreError::ImportError { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn invalid_batch_writes_nothing() {
        let harness = create_test_harness();
        let service = ImportExportService::new(harness.ctx.clone());
        let text = format!("{BATCH}broken|line\n");

        assert!(service.import(&text).await.is_err());
        assert!(harness.domains.all_domains().await.is_empty());
    }

    #[tokio::test]
    async fn import_creates_updates_and_skips() {
        let harness = create_test_harness();
        let existing = seed_domain(&harness.domains, "api.example.com", 443).await;
        seed_forward(&harness.domains, existing.id, "edge-1.example.net", 10, 0).await;
        harness.gateway.add_zone("example.com", "zone-com").await;
        harness
            .gateway
            .add_record("zone-com", "static.example.com", "rec-static")
            .await;
        let service = ImportExportService::new(harness.ctx.clone());

        let summary = service.import(BATCH).await.unwrap();

        assert_eq!(summary.domains_created, 1);
        assert_eq!(summary.domains_updated, 1);
        assert_eq!(summary.forwards_added, 2);
        assert_eq!(summary.forwards_skipped, 1);

        let created = harness
            .domains
            .all_domains()
            .await
            .into_iter()
            .find(|d| d.domain == "static.example.com")
            .unwrap();
        assert_eq!(created.record_id, "rec-static");
        assert!(created.is_disable_check);

        let forwards = harness.domains.list_forwards_of(existing.id).await;
        let cdn = forwards.iter().find(|f| f.forward_domain == "cdn.example.net").unwrap();
        assert!(cdn.is_ban);
        assert!(cdn.ban_until.is_none());
    }

    #[tokio::test]
    async fn missing_zone_only_warns() {
        let harness = create_test_harness();
        let service = ImportExportService::new(harness.ctx.clone());

        let summary = service
            .import("new.example.io|443|false|0|edge.example.net|1.1.1.1|CT|false|1|0|A")
            .await
            .unwrap();

        assert_eq!(summary.domains_created, 1);
        let domain = &harness.domains.all_domains().await[0];
        assert!(!domain.has_dns_target());
    }

    #[tokio::test]
    async fn export_round_trips_through_import() {
        let harness = create_test_harness();
        let service = ImportExportService::new(harness.ctx.clone());
        service.import(BATCH).await.unwrap();

        let exported = service.export().await.unwrap();
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "api.example.com|443|false|1|edge-1.example.net|1.2.3.4|CT|false|10|0|A"
        );
        assert_eq!(
            lines[1],
            "api.example.com|443|false|1|cdn.example.net||CU|true|5|1|CNAME"
        );

        let reparsed = parse_import(&exported).unwrap();
        assert_eq!(reparsed.len(), 3);
    }

    #[tokio::test]
    async fn empty_store_has_nothing_to_export() {
        let harness = create_test_harness();
        seed_domain(&harness.domains, "api.example.com", 443).await;
        let service = ImportExportService::new(harness.ctx.clone());

        assert!(matches!(service.export().await, Err(CoreError::ExportEmpty)));
    }
}
