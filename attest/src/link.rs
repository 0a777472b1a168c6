//! Verification deep links.
//!
//! A QR code on a product carries a URL with `?verify=<contractAddress>`
//! and `&token=<tokenId>` query parameters. Scanning hands the URL to the
//! verification flow, which needs the two parameters back out. The token
//! value is deliberately kept as the raw string: the verification engine
//! owns token id validation, and pre-parsing here would let malformed
//! scans bypass its rejection messages.

use std::fmt;

use crate::types::{Address, AddressParseError, TokenId};

/// Errors raised while parsing a verification deep link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkError {
    /// The URL carries no `verify` parameter.
    MissingContract,
    /// The URL carries no `token` parameter.
    MissingToken,
    /// The `verify` parameter is not a well-formed address.
    BadContract(AddressParseError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::MissingContract => write!(f, "link has no verify= contract parameter"),
            LinkError::MissingToken => write!(f, "link has no token= parameter"),
            LinkError::BadContract(e) => write!(f, "bad contract address in link: {e}"),
        }
    }
}

impl std::error::Error for LinkError {}

/// A parsed verification deep link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifyLink {
    /// Contract the token was minted on.
    pub contract: Address,
    /// Raw token id string, validated later by the verification engine.
    pub token: String,
}

impl VerifyLink {
    /// Builds the query-string form appended to a base URL.
    pub fn to_query(&self, base_url: &str) -> String {
        format!("{}?verify={}&token={}", base_url, self.contract, self.token)
    }

    /// Convenience constructor from a known token id.
    pub fn new(contract: Address, token_id: TokenId) -> Self {
        Self {
            contract,
            token: token_id.to_string(),
        }
    }
}

/// Parses a scanned URL (or bare query string) into a [`VerifyLink`].
pub fn parse_verify_link(url: &str) -> Result<VerifyLink, LinkError> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or(url);
    let query = query.split('#').next().unwrap_or("");

    let mut contract = None;
    let mut token = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "verify" => contract = Some(value),
            "token" => token = Some(value),
            _ => {}
        }
    }

    let contract = contract.filter(|v| !v.is_empty()).ok_or(LinkError::MissingContract)?;
    let token = token.filter(|v| !v.is_empty()).ok_or(LinkError::MissingToken)?;
    let contract = Address::parse(contract).map_err(LinkError::BadContract)?;

    Ok(VerifyLink {
        contract,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x74dba1ee38db3f03491d6ccd3da4bf7d525fd2d7";

    #[test]
    fn round_trips_through_a_full_url() {
        let link = VerifyLink::new(Address::parse(CONTRACT).unwrap(), TokenId(7));
        let url = link.to_query("https://verify.example/scan");
        assert_eq!(
            url,
            format!("https://verify.example/scan?verify={CONTRACT}&token=7")
        );
        assert_eq!(parse_verify_link(&url).unwrap(), link);
    }

    #[test]
    fn parses_bare_query_strings_and_ignores_extras() {
        let link =
            parse_verify_link(&format!("utm_source=qr&verify={CONTRACT}&token=12")).unwrap();
        assert_eq!(link.token, "12");
    }

    #[test]
    fn missing_parameters_are_distinct_errors() {
        assert_eq!(
            parse_verify_link("https://x.example/?token=1"),
            Err(LinkError::MissingContract)
        );
        assert_eq!(
            parse_verify_link(&format!("https://x.example/?verify={CONTRACT}")),
            Err(LinkError::MissingToken)
        );
    }

    #[test]
    fn malformed_contract_addresses_are_rejected() {
        assert!(matches!(
            parse_verify_link("?verify=0x123&token=1"),
            Err(LinkError::BadContract(_))
        ));
    }

    #[test]
    fn token_value_is_not_prevalidated() {
        // Garbage token values must reach the verification engine so its
        // input rejection produces the user-facing message.
        let link = parse_verify_link(&format!("?verify={CONTRACT}&token=0xabc")).unwrap();
        assert_eq!(link.token, "0xabc");
    }
}
