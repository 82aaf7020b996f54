//! Connected Shopify stores and tracked Facebook Ads campaigns.
//!
//! Only the identifiers are stored; no call is made to either platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ProfitdashError, Result},
    subscription::UserId,
};

const SHOPIFY_SUFFIX: &str = ".myshopify.com";
const MAX_SHOP_NAME_CHARS: usize = 60;
const MAX_CAMPAIGN_NAME_CHARS: usize = 120;

/// Shopify store domain, `<name>.myshopify.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Parses a shop domain. Input is trimmed and lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] if the domain is not
    /// `<name>.myshopify.com` with a 1-60 character name of lowercase
    /// alphanumerics and hyphens.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::connections::ShopDomain;
    ///
    /// assert_eq!(ShopDomain::new("Acme-Goods.myshopify.com").unwrap().as_str(), "acme-goods.myshopify.com");
    /// assert!(ShopDomain::new("acme.com").is_err());
    /// ```
    pub fn new<S: Into<String>>(domain: S) -> Result<Self> {
        let domain = domain.into().trim().to_ascii_lowercase();
        let Some(name) = domain.strip_suffix(SHOPIFY_SUFFIX) else {
            return Err(ProfitdashError::Validation(format!(
                "shop domain must end with {SHOPIFY_SUFFIX}"
            )));
        };
        if name.is_empty() || name.len() > MAX_SHOP_NAME_CHARS {
            return Err(ProfitdashError::Validation(format!(
                "shop name must be 1-{MAX_SHOP_NAME_CHARS} characters"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(ProfitdashError::Validation(
                "shop name can only contain letters, digits, and hyphens".into(),
            ));
        }
        Ok(Self(domain))
    }

    /// Returns the domain.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ProfitdashError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ShopDomain> for String {
    fn from(value: ShopDomain) -> Self {
        value.0
    }
}

/// A connected Shopify store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedStore {
    /// Connection ID.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Store domain.
    pub shop_domain: ShopDomain,
    /// Connection time.
    pub connected_at: DateTime<Utc>,
}

/// Request to connect a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectStoreRequest {
    /// Store domain.
    pub shop_domain: ShopDomain,
}

impl ConnectStoreRequest {
    /// Builds the connection record.
    #[must_use]
    pub fn into_store(self, user_id: UserId, now: DateTime<Utc>) -> ConnectedStore {
        ConnectedStore { id: Uuid::new_v4(), user_id, shop_domain: self.shop_domain, connected_at: now }
    }
}

/// Facebook ad account ID, `act_<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdAccountId(String);

impl AdAccountId {
    /// Parses an ad account ID.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] unless the ID is `act_` followed by digits.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        match id.strip_prefix("act_") {
            Some(digits) if is_digits(digits) => Ok(Self(id)),
            _ => Err(ProfitdashError::Validation(format!(
                "ad account id must look like act_<digits>, got {id:?}"
            ))),
        }
    }

    /// Returns the ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AdAccountId {
    type Error = ProfitdashError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AdAccountId> for String {
    fn from(value: AdAccountId) -> Self {
        value.0
    }
}

/// A tracked ad campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedCampaign {
    /// Tracking ID.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Ad account.
    pub ad_account_id: AdAccountId,
    /// Campaign ID within the ad account.
    pub campaign_id: String,
    /// Display name.
    pub name: String,
    /// Tracking start.
    pub tracked_at: DateTime<Utc>,
}

/// Request to track a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCampaignRequest {
    /// Ad account.
    pub ad_account_id: AdAccountId,
    /// Campaign ID, digits only.
    pub campaign_id: String,
    /// Display name, 1-120 characters.
    pub name: String,
}

impl TrackCampaignRequest {
    /// Validates the request and builds the tracking record.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] on a malformed campaign ID or name.
    pub fn into_campaign(self, user_id: UserId, now: DateTime<Utc>) -> Result<TrackedCampaign> {
        let campaign_id = self.campaign_id.trim();
        if !is_digits(campaign_id) {
            return Err(ProfitdashError::Validation("campaign id must be digits".into()));
        }
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_CAMPAIGN_NAME_CHARS {
            return Err(ProfitdashError::Validation(format!(
                "campaign name must be 1-{MAX_CAMPAIGN_NAME_CHARS} characters"
            )));
        }
        Ok(TrackedCampaign {
            id: Uuid::new_v4(),
            user_id,
            ad_account_id: self.ad_account_id,
            campaign_id: campaign_id.to_owned(),
            name: name.to_owned(),
            tracked_at: now,
        })
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn test_shop_domain_validation() {
        assert!(ShopDomain::new("acme.myshopify.com").is_ok());
        assert!(ShopDomain::new("  ACME.myshopify.com ").is_ok());
        assert!(ShopDomain::new(".myshopify.com").is_err());
        assert!(ShopDomain::new("acme_store.myshopify.com").is_err());
        assert!(ShopDomain::new("acme.myshopify.com.evil.io").is_err());
        assert!(ShopDomain::new(format!("{}.myshopify.com", "a".repeat(60))).is_ok());
        assert!(ShopDomain::new(format!("{}.myshopify.com", "a".repeat(61))).is_err());
    }

    #[test]
    fn test_shop_domain_deserialize_normalizes() {
        let req: ConnectStoreRequest =
            serde_json::from_str(r#"{"shop_domain":"Acme.MyShopify.com"}"#).unwrap();
        assert_eq!(req.shop_domain.as_str(), "acme.myshopify.com");
    }

    #[test]
    fn test_ad_account_validation() {
        assert!(AdAccountId::new("act_123456").is_ok());
        assert!(AdAccountId::new("act_").is_err());
        assert!(AdAccountId::new("123456").is_err());
        assert!(AdAccountId::new("act_12a").is_err());
    }

    #[test]
    fn test_campaign_request_validation() {
        let request = |campaign_id: &str, name: &str| TrackCampaignRequest {
            ad_account_id: AdAccountId::new("act_1").unwrap(),
            campaign_id: campaign_id.to_owned(),
            name: name.to_owned(),
        };
        let now = Utc::now();
        assert!(request("2384", "Spring sale").into_campaign(user(), now).is_ok());
        assert!(request("abc", "Spring sale").into_campaign(user(), now).is_err());
        assert!(request("2384", " ").into_campaign(user(), now).is_err());
        assert!(request("2384", &"n".repeat(121)).into_campaign(user(), now).is_err());
    }
}
