//! Record types of the legacy signed calling convention.
//!
//! The field tables below are the contract: their order is the order the
//! remote schema declares, which the server uses to rebuild the signed string.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_legacy_record_encode;
use crate::legacy::encode::{Field, FieldValue, LegacyRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Txt,
    Srv,
    Sshfp,
    Tlsa,
    Caa,
}

impl DnsRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Cname => "CNAME",
            DnsRecordType::Mx => "MX",
            DnsRecordType::Ns => "NS",
            DnsRecordType::Txt => "TXT",
            DnsRecordType::Srv => "SRV",
            DnsRecordType::Sshfp => "SSHFP",
            DnsRecordType::Tlsa => "TLSA",
            DnsRecordType::Caa => "CAA",
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsEntry {
    pub name: String,
    /// TTL in seconds
    pub expire: i64,
    #[serde(rename = "type")]
    pub entry_type: DnsRecordType,
    pub content: String,
}

impl DnsEntry {
    pub fn new(name: impl Into<String>, expire: i64, entry_type: DnsRecordType, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expire,
            entry_type,
            content: content.into(),
        }
    }
}

const DNS_ENTRY_FIELDS: &[Field<DnsEntry>] = &[
    Field { name: "name", value: |e| FieldValue::Str(e.name.clone()) },
    Field { name: "expire", value: |e| FieldValue::Int(e.expire) },
    Field { name: "type", value: |e| FieldValue::Str(e.entry_type.as_str().to_owned()) },
    Field { name: "content", value: |e| FieldValue::Str(e.content.clone()) },
];

impl LegacyRecord for DnsEntry {
    const TYPE_NAME: &'static str = "DnsEntry";

    fn fields() -> &'static [Field<Self>] {
        DNS_ENTRY_FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSecEntry {
    pub key_tag: i64,
    pub flags: i64,
    pub algorithm: i64,
    pub public_key: String,
}

const DNSSEC_ENTRY_FIELDS: &[Field<DnsSecEntry>] = &[
    Field { name: "keyTag", value: |e| FieldValue::Int(e.key_tag) },
    Field { name: "flags", value: |e| FieldValue::Int(e.flags) },
    Field { name: "algorithm", value: |e| FieldValue::Int(e.algorithm) },
    Field { name: "publicKey", value: |e| FieldValue::Str(e.public_key.clone()) },
];

impl LegacyRecord for DnsSecEntry {
    const TYPE_NAME: &'static str = "DnsSecEntry";

    fn fields() -> &'static [Field<Self>] {
        DNSSEC_ENTRY_FIELDS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nameserver {
    pub hostname: String,
    /// glue records, empty when unused
    #[serde(default)]
    pub ipv4: String,
    #[serde(default)]
    pub ipv6: String,
}

const NAMESERVER_FIELDS: &[Field<Nameserver>] = &[
    Field { name: "hostname", value: |n| FieldValue::Str(n.hostname.clone()) },
    Field { name: "ipv4", value: |n| FieldValue::Str(n.ipv4.clone()) },
    Field { name: "ipv6", value: |n| FieldValue::Str(n.ipv6.clone()) },
];

impl LegacyRecord for Nameserver {
    const TYPE_NAME: &'static str = "Nameserver";

    fn fields() -> &'static [Field<Self>] {
        NAMESERVER_FIELDS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisContact {
    /// registrant, administrative or technical
    #[serde(rename = "type")]
    pub contact_type: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub company_name: String,
    pub company_kvk: String,
    pub company_type: String,
    pub street: String,
    pub number: String,
    pub postal_code: String,
    pub city: String,
    pub phone_number: String,
    pub fax_number: String,
    pub email: String,
    pub country: String,
}

const WHOIS_CONTACT_FIELDS: &[Field<WhoisContact>] = &[
    Field { name: "type", value: |c| FieldValue::Str(c.contact_type.clone()) },
    Field { name: "firstName", value: |c| FieldValue::Str(c.first_name.clone()) },
    Field { name: "middleName", value: |c| FieldValue::Str(c.middle_name.clone()) },
    Field { name: "lastName", value: |c| FieldValue::Str(c.last_name.clone()) },
    Field { name: "companyName", value: |c| FieldValue::Str(c.company_name.clone()) },
    Field { name: "companyKvk", value: |c| FieldValue::Str(c.company_kvk.clone()) },
    Field { name: "companyType", value: |c| FieldValue::Str(c.company_type.clone()) },
    Field { name: "street", value: |c| FieldValue::Str(c.street.clone()) },
    Field { name: "number", value: |c| FieldValue::Str(c.number.clone()) },
    Field { name: "postalCode", value: |c| FieldValue::Str(c.postal_code.clone()) },
    Field { name: "city", value: |c| FieldValue::Str(c.city.clone()) },
    Field { name: "phoneNumber", value: |c| FieldValue::Str(c.phone_number.clone()) },
    Field { name: "faxNumber", value: |c| FieldValue::Str(c.fax_number.clone()) },
    Field { name: "email", value: |c| FieldValue::Str(c.email.clone()) },
    Field { name: "country", value: |c| FieldValue::Str(c.country.clone()) },
];

impl LegacyRecord for WhoisContact {
    const TYPE_NAME: &'static str = "WhoisContact";

    fn fields() -> &'static [Field<Self>] {
        WHOIS_CONTACT_FIELDS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpamCheckerStrength {
    Off,
    Low,
    Average,
    High,
}

impl SpamCheckerStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpamCheckerStrength::Off => "OFF",
            SpamCheckerStrength::Low => "LOW",
            SpamCheckerStrength::Average => "AVERAGE",
            SpamCheckerStrength::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailBox {
    pub address: String,
    pub spam_checker_strength: SpamCheckerStrength,
    /// megabytes
    pub max_disk_usage: i64,
    pub has_vacation_reply: bool,
    pub vacation_reply_subject: String,
    pub vacation_reply_message: String,
}

const MAILBOX_FIELDS: &[Field<MailBox>] = &[
    Field { name: "address", value: |m| FieldValue::Str(m.address.clone()) },
    Field { name: "spamCheckerStrength", value: |m| FieldValue::Str(m.spam_checker_strength.as_str().to_owned()) },
    Field { name: "maxDiskUsage", value: |m| FieldValue::Int(m.max_disk_usage) },
    Field { name: "hasVacationReply", value: |m| FieldValue::Bool(m.has_vacation_reply) },
    Field { name: "vacationReplySubject", value: |m| FieldValue::Str(m.vacation_reply_subject.clone()) },
    Field { name: "vacationReplyMessage", value: |m| FieldValue::Str(m.vacation_reply_message.clone()) },
];

impl LegacyRecord for MailBox {
    const TYPE_NAME: &'static str = "MailBox";

    fn fields() -> &'static [Field<Self>] {
        MAILBOX_FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailForward {
    pub alias_name: String,
    pub target_address: String,
}

const MAIL_FORWARD_FIELDS: &[Field<MailForward>] = &[
    Field { name: "aliasName", value: |m| FieldValue::Str(m.alias_name.clone()) },
    Field { name: "targetAddress", value: |m| FieldValue::Str(m.target_address.clone()) },
];

impl LegacyRecord for MailForward {
    const TYPE_NAME: &'static str = "MailForward";

    fn fields() -> &'static [Field<Self>] {
        MAIL_FORWARD_FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub name: String,
    pub username: String,
    /// megabytes
    pub max_disk_usage: i64,
}

const DATABASE_FIELDS: &[Field<Database>] = &[
    Field { name: "name", value: |d| FieldValue::Str(d.name.clone()) },
    Field { name: "username", value: |d| FieldValue::Str(d.username.clone()) },
    Field { name: "maxDiskUsage", value: |d| FieldValue::Int(d.max_disk_usage) },
];

impl LegacyRecord for Database {
    const TYPE_NAME: &'static str = "Db";

    fn fields() -> &'static [Field<Self>] {
        DATABASE_FIELDS
    }
}

/// Triggers use crontab syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cronjob {
    pub name: String,
    pub url: String,
    pub email: String,
    pub minute_trigger: String,
    pub hour_trigger: String,
    pub day_trigger: String,
    pub month_trigger: String,
    pub weekday_trigger: String,
}

const CRONJOB_FIELDS: &[Field<Cronjob>] = &[
    Field { name: "name", value: |c| FieldValue::Str(c.name.clone()) },
    Field { name: "url", value: |c| FieldValue::Str(c.url.clone()) },
    Field { name: "email", value: |c| FieldValue::Str(c.email.clone()) },
    Field { name: "minuteTrigger", value: |c| FieldValue::Str(c.minute_trigger.clone()) },
    Field { name: "hourTrigger", value: |c| FieldValue::Str(c.hour_trigger.clone()) },
    Field { name: "dayTrigger", value: |c| FieldValue::Str(c.day_trigger.clone()) },
    Field { name: "monthTrigger", value: |c| FieldValue::Str(c.month_trigger.clone()) },
    Field { name: "weekdayTrigger", value: |c| FieldValue::Str(c.weekday_trigger.clone()) },
];

impl LegacyRecord for Cronjob {
    const TYPE_NAME: &'static str = "Cronjob";

    fn fields() -> &'static [Field<Self>] {
        CRONJOB_FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDomain {
    pub name: String,
}

const SUB_DOMAIN_FIELDS: &[Field<SubDomain>] = &[
    Field { name: "name", value: |s| FieldValue::Str(s.name.clone()) },
];

impl LegacyRecord for SubDomain {
    const TYPE_NAME: &'static str = "SubDomain";

    fn fields() -> &'static [Field<Self>] {
        SUB_DOMAIN_FIELDS
    }
}

impl_legacy_record_encode!(
    DnsEntry,
    DnsSecEntry,
    Nameserver,
    WhoisContact,
    MailBox,
    MailForward,
    Database,
    Cronjob,
    SubDomain,
);
