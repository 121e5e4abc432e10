//! Catalog records as the indexer consumes them.
//!
//! Only the fields the graph needs are modelled; everything else in the
//! upstream document is ignored. All nested collections default to empty.

use serde::{Deserialize, Serialize};

/// One item of a `collections.umm_json` search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub meta: CollectionMeta,
    pub umm: CollectionUmm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    #[serde(rename = "concept-id")]
    pub concept_id: String,
    #[serde(rename = "provider-id", default)]
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionUmm {
    #[serde(default)]
    pub entry_title: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<Doi>,
    #[serde(default)]
    pub related_urls: Vec<RelatedUrl>,
    /// Campaign references; the catalog keeps them under `Projects`.
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
    #[serde(default)]
    pub platforms: Vec<PlatformRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Doi {
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedUrl {
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Subtype", default)]
    pub subtype: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectRef {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlatformRef {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub instruments: Vec<InstrumentRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstrumentRef {
    #[serde(default)]
    pub short_name: Option<String>,
}

/// An access-control entry from `/access-control/acls/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclRecord {
    #[serde(default)]
    pub catalog_item_identity: Option<CatalogItemIdentity>,
    #[serde(default)]
    pub group_permissions: Vec<GroupPermission>,
    #[serde(default)]
    pub legacy_guid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItemIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub collection_identifier: Option<CollectionIdentifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionIdentifier {
    #[serde(default)]
    pub concept_ids: Vec<String>,
    #[serde(default)]
    pub entry_titles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPermission {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// One page of a scrolled collection search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionPage {
    pub concept_ids: Vec<String>,
    pub scroll_id: Option<String>,
}

/// One numbered page of the catalog item acl listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclPage {
    pub concept_ids: Vec<String>,
    /// Total acls reported upstream, when given.
    pub hits: Option<u64>,
}
