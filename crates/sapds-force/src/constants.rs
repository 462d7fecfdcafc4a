//! Service, entity set, and field names of the Force Element OData services.

use sapds_core::types::HierarchyType;

/// Force Element master data (transactional processing view).
pub const SVC_FORCE_ELEMENT: &str = "DFS_FE_FRCELMNTORG_SRV";
/// Force Element network graph.
pub const SVC_GRAPH: &str = "DFS_FE_FRCELMNTORGNTWKGRAPH_SRV";

pub const ES_FORCE_ELEMENT_TP: &str = "C_FrcElmntOrgTP";
pub const ES_GRAPH_EDGE: &str = "C_FrcElmntOrgNtwkGraphRelshp";

pub const ID_FIELD: &str = "ForceElementOrgID";
pub const SRC_FIELD: &str = "ForceElementOrgID";
pub const DST_FIELD: &str = "FrcElmntOrgRelatedOrgID";
pub const REL_FIELD: &str = "FrcElmntOrgSubType";
pub const SYMBOL_FIELD: &str = "FrcElmntOrgSymbol";

/// Relation code of the structural (parent/child) hierarchy.
pub const REL_STRUCTURE: &str = "B002";

/// Display name fields, in preference order.
pub const NAME_FIELDS: [&str; 6] = [
    "FrcElmntOrgName",
    "FrcElmntOrgShortName",
    "FrcElmntOrgConcatenatedName",
    "ForceElementOrgName",
    "Name",
    "Description",
];

/// Name fields requested in `$select` when resolving labels.
pub const NAME_SELECT_COUNT: usize = 3;

pub const MATERIAL_PCT_FIELD: &str = "FrcElmntOrgMatlRdnssPct";
pub const PERSONNEL_PCT_FIELD: &str = "FrcElmntOrgPrsnlRdnssPct";
pub const TRAINING_PCT_FIELD: &str = "FrcElmntOrgTrngRdnssPct";

pub const READINESS_FIELDS: [&str; 3] = [MATERIAL_PCT_FIELD, PERSONNEL_PCT_FIELD, TRAINING_PCT_FIELD];

/// Fields that may carry the military symbol code, probed in order.
pub const SIDC_FIELD_CANDIDATES: [&str; 16] = [
    "SIDC",
    "Sidc",
    "MILSIDC",
    "MilSidc",
    "MilStdSidc",
    "MilStd2525Sidc",
    "NATOApp6bSidc",
    "NatoApp6bSidc",
    "MilitarySymbolCode",
    "MilSymbolCode",
    "MilSymbolID",
    "MilSymbol",
    "FrcElmntOrgMilSymbCode",
    "FrcElmntOrgMilSymbCd",
    "FrcElmntOrgMilSymbID",
    SYMBOL_FIELD,
];

pub const PARENT_STRUCTURE_FIELD: &str = "FrcElmntOrgStrucParentID";
pub const PARENT_PEACETIME_FIELD: &str = "FrcElmntOrgPeaceTimeParentID";
pub const PARENT_WARTIME_FIELD: &str = "FrcElmntOrgWarTimeParentID";
pub const PARENT_OPERATION_FIELD: &str = "FrcElmntOrgOplAssgmtParentID";
pub const PARENT_EXERCISE_FIELD: &str = "FrcElmntOrgExerAssgmtParentID";

/// Restricts hierarchy queries to activated (non-draft) records.
pub const ACTIVE_ENTITY_FILTER: &str = "IsActiveEntity eq true";

/// Icon used until a symbol code is known.
pub const DEFAULT_ICON_URL: &str = "/icons/cache/unit-default.svg";

/// Parent-ID field that defines `hierarchy`.
pub fn parent_field(hierarchy: HierarchyType) -> &'static str {
    match hierarchy {
        HierarchyType::Structure => PARENT_STRUCTURE_FIELD,
        HierarchyType::Peacetime => PARENT_PEACETIME_FIELD,
        HierarchyType::Wartime => PARENT_WARTIME_FIELD,
        HierarchyType::Operation => PARENT_OPERATION_FIELD,
        HierarchyType::Exercise => PARENT_EXERCISE_FIELD,
    }
}
