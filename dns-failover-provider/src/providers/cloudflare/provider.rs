//! Cloudflare `DnsCommitGateway` 实现

use async_trait::async_trait;
use reqwest::Method;

use crate::error::{ProviderError, Result};
use crate::providers::common::normalize_domain_name;
use crate::traits::{DnsCommitGateway, ErrorContext, ProviderErrorMapper};
use crate::types::{DnsRecord, DnsRecordUpdate};

use super::{CloudflareDnsRecord, CloudflareProvider, CloudflareRecordBody, CloudflareZone};

impl CloudflareProvider {
    fn to_dns_record(cf_record: CloudflareDnsRecord, zone_id: &str) -> DnsRecord {
        DnsRecord {
            id: cf_record.id,
            zone_id: zone_id.to_string(),
            record_type: cf_record.record_type,
            name: normalize_domain_name(&cf_record.name),
            content: cf_record.content,
            ttl: cf_record.ttl,
            proxied: cf_record.proxied,
        }
    }
}

#[async_trait]
impl DnsCommitGateway for CloudflareProvider {
    fn id(&self) -> &'static str {
        "cloudflare"
    }

    async fn update_record(&self, req: &DnsRecordUpdate) -> Result<DnsRecord> {
        let body = CloudflareRecordBody {
            record_type: req.kind.as_str(),
            name: &req.name,
            content: &req.content,
            ttl: req.ttl,
            proxied: req.proxied,
        };
        let path = format!("/zones/{}/dns_records/{}", req.zone_id, req.record_id);
        let record: CloudflareDnsRecord = self
            .call_result(
                Method::PATCH,
                &path,
                Some(&body),
                ErrorContext::for_record(&req.record_id, &req.name),
            )
            .await?;

        log::info!(
            "[cloudflare] {} {} -> {} (ttl {})",
            req.kind,
            req.name,
            req.content,
            req.ttl
        );
        Ok(Self::to_dns_record(record, &req.zone_id))
    }

    async fn find_zone_id(&self, zone_name: &str) -> Result<String> {
        let zone_name = normalize_domain_name(zone_name);
        let path = format!("/zones?name={}", urlencoding::encode(&zone_name));
        let zones: Vec<CloudflareZone> = self
            .call_result::<_, ()>(
                Method::GET,
                &path,
                None,
                ErrorContext::for_domain(&zone_name),
            )
            .await?;

        zones
            .into_iter()
            .find(|z| normalize_domain_name(&z.name) == zone_name)
            .map(|z| z.id)
            .ok_or_else(|| ProviderError::DomainNotFound {
                provider: self.provider_name().to_string(),
                domain: zone_name,
                raw_message: None,
            })
    }

    async fn find_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>> {
        let name = normalize_domain_name(name);
        let path = format!(
            "/zones/{zone_id}/dns_records?name={}",
            urlencoding::encode(&name)
        );
        let records: Vec<CloudflareDnsRecord> = self
            .call_result::<_, ()>(Method::GET, &path, None, ErrorContext::for_domain(&name))
            .await?;

        Ok(records
            .into_iter()
            .next()
            .map(|r| Self::to_dns_record(r, zone_id)))
    }
}
