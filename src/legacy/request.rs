use crate::auth::error::SigningError;
use crate::auth::request::new_nonce;
use crate::auth::signer::{sign_base64, PrivateKey};
use crate::helpers::time::now_i64;
use crate::legacy::encode::LegacyEncode;
use crate::legacy::params::ParameterList;

pub const DEFAULT_HOSTNAME: &str = "api.example.com";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-call values that enter the signature besides the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySigningContext {
    pub login: String,
    pub hostname: String,
    pub read_only: bool,
    pub timestamp: i64,
    pub nonce: String,
}

impl LegacySigningContext {
    /// Fresh timestamp and nonce.
    pub fn new(login: impl Into<String>, hostname: impl Into<String>, read_only: bool) -> Self {
        Self {
            login: login.into(),
            hostname: hostname.into(),
            read_only,
            timestamp: now_i64(),
            nonce: new_nonce(),
        }
    }

    fn mode(&self) -> &'static str {
        if self.read_only {
            "readonly"
        } else {
            "readwrite"
        }
    }
}

/// A call in the legacy convention, arguments kept in call order.
#[derive(Debug, Clone)]
pub struct LegacyCall {
    service: String,
    method: String,
    params: ParameterList,
    body_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLegacyCall {
    /// base64 signature over [`LegacyCall::signature_base`]
    pub signature: String,
    /// value of the `Cookie` header
    pub cookie: String,
    /// method element for the SOAP body
    pub body: String,
}

impl LegacyCall {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            params: ParameterList::new(),
            body_args: Vec::new(),
        }
    }

    /// Adds the next positional argument; `key` names its body element.
    pub fn arg<T: LegacyEncode + ?Sized>(mut self, key: &str, value: &T) -> Self {
        let index = self.body_args.len();
        self.params.add_encoded(index, value);
        self.body_args.push(value.encode_body(key));
        self
    }

    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub fn signature_base(&self, ctx: &LegacySigningContext) -> String {
        let mut params = self.params.clone();
        params.add("__method", self.method.as_str());
        params.add("__service", self.service.as_str());
        params.add("__hostname", ctx.hostname.as_str());
        params.add("__timestamp", ctx.timestamp.to_string());
        params.add("__nonce", ctx.nonce.as_str());
        params.to_signature_string()
    }

    pub fn body(&self) -> String {
        let mut out = format!("<ns1:{}>\n", self.method);
        for arg in &self.body_args {
            out.push_str(arg);
            out.push('\n');
        }
        out.push_str(&format!("</ns1:{}>", self.method));
        out
    }

    pub fn sign(&self, ctx: &LegacySigningContext, key: &PrivateKey) -> Result<SignedLegacyCall, SigningError> {
        let signature = sign_base64(self.signature_base(ctx).as_bytes(), key)?;
        let cookie = format!(
            "login={};mode={};timestamp={};nonce={};clientVersion={};signature={}",
            ctx.login,
            ctx.mode(),
            ctx.timestamp,
            ctx.nonce,
            CLIENT_VERSION,
            urlencoding::encode(&signature),
        );
        Ok(SignedLegacyCall {
            signature,
            cookie,
            body: self.body(),
        })
    }
}
