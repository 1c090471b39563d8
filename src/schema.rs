/// Column-name constants and fixed labels used by the census reports.
/// Single source of truth for the defaults in `config`.

// ── Geography columns ───────────────────────────────────────────────────────
pub mod geography {
    pub const CMA_NAME: &str = "CMANAME";
    pub const PROVINCE_NAME: &str = "PRNAME";
    pub const ADA_CODE: &str = "ADA_code";
    /// Area code attribute in the ADA boundary file.
    pub const BOUNDARY_ADA_CODE: &str = "ADAUID";
}

// ── Immigration status counts ───────────────────────────────────────────────
pub mod immigration {
    pub const NON_IMMIGRANTS: &str = "T1528";
    pub const RECENT_IMMIGRANTS: &str = "T1536";

    /// Pivot-table exports prefix the summed columns.
    pub const SUM_NON_IMMIGRANTS: &str = "Sum of T1528";
    pub const SUM_RECENT_IMMIGRANTS: &str = "Sum of T1536";
}

// ── Admission class counts ──────────────────────────────────────────────────
pub mod admission {
    pub const ECONOMIC: &str = "T1670";
    pub const FAMILY: &str = "T1673";
    pub const REFUGEE: &str = "T1674";
    pub const OTHER: &str = "T1675";

    pub const ALL: [&str; 4] = [ECONOMIC, FAMILY, REFUGEE, OTHER];
    pub const LABELS: [&str; 4] = ["Economic", "Family", "Refugee", "Other"];

    /// 2021 national shares, same order as `LABELS`.
    pub const NATIONAL_2021: [f64; 4] = [53.9, 29.6, 15.2, 1.3];
}

// ── Generation status counts ────────────────────────────────────────────────
pub mod generation {
    pub const FIRST: &str = "T1666";
    pub const SECOND: &str = "T1667";
    pub const THIRD: &str = "T1668";

    pub const ALL: [&str; 3] = [FIRST, SECOND, THIRD];
    pub const LABELS: [&str; 3] = ["First Gen", "Second Gen", "Third Gen"];

    pub const NATIONAL_2021: [f64; 3] = [26.4, 17.6, 56.0];
}

// ── Accessibility scores ────────────────────────────────────────────────────
pub mod access {
    pub const PUBLIC_TRANSIT_EMPLOYMENT: &str = "public_emp";
    pub const WALK_EMPLOYMENT: &str = "walk_emp";
    pub const WALK_EDUCATION: &str = "walk_ef";
}

// ── Derived columns ─────────────────────────────────────────────────────────
pub mod derived {
    pub const REGION: &str = "region";
    pub const PCT_RECENT_IMMIGRANTS: &str = "pct_recent_immigrants";
    pub const TIER: &str = "tier";
    pub const LABEL: &str = "label";
    pub const SCORE: &str = "score";
}

// ── Tier labels ─────────────────────────────────────────────────────────────
pub mod tier {
    pub const TOP_10: &str = "Top 10%";
    pub const NEXT_10: &str = "Next 10%";
    pub const NEXT_20: &str = "Next 20%";
    pub const OTHER: &str = "Other";
    pub const NO_DATA: &str = "No data";

    pub const HIGH_ACCESS: &str = "High Access";
    pub const LOW_ACCESS: &str = "Low Access";
    pub const HIGH_WALK: &str = "High Walk";
    pub const LOW_WALK: &str = "Low Walk";

    pub const NATIONAL_CENSUS_2021: &str = "National Census 2021";
}
