//! Static sector keyword-rule and "giants" registry.
//!
//! Ported from `engine/sector_config.py`: one rule per sector with a
//! required-keyword set (at least one must hit), an optional boost set
//! (additional confidence, no gating), and an exclude set (any hit
//! vetoes the sector), plus a named-company override table ("sector
//! giants") that assigns a sector even when no keyword fires.

pub struct SectorRule {
    pub sector: &'static str,
    pub required: &'static [&'static str],
    pub boost: &'static [&'static str],
    pub exclude: &'static [&'static str],
}

pub const SECTOR_RULES: &[SectorRule] = &[
    SectorRule {
        sector: "ENERGY",
        required: &["oil", "gas", "opec", "barrel", "pipeline", "crude"],
        boost: &["refinery", "drilling"],
        exclude: &["video game"],
    },
    SectorRule {
        sector: "TECHNOLOGY",
        required: &["chip", "semiconductor", "software", "cloud", "ai model"],
        boost: &["data center", "platform"],
        exclude: &[],
    },
    SectorRule {
        sector: "FINANCIALS",
        required: &["bank", "lender", "insurer", "credit rating"],
        boost: &["deposits", "loan book"],
        exclude: &["food bank"],
    },
    SectorRule {
        sector: "HEALTHCARE",
        required: &["drug", "fda", "clinical trial", "vaccine", "biotech"],
        boost: &["pipeline therapy"],
        exclude: &[],
    },
    SectorRule {
        sector: "CONSUMER",
        required: &["retail", "consumer spending", "e-commerce"],
        boost: &["holiday sales"],
        exclude: &[],
    },
    SectorRule {
        sector: "INDUSTRIALS",
        required: &["manufacturing", "factory", "supply chain", "logistics"],
        boost: &["freight"],
        exclude: &[],
    },
    SectorRule {
        sector: "CRYPTO",
        required: &["blockchain", "token", "defi", "stablecoin", "exchange listing"],
        boost: &["onchain"],
        exclude: &[],
    },
];

/// Named flagship companies that map straight to a sector regardless of
/// keyword hits ("sector giants").
pub const SECTOR_GIANTS: &[(&str, &str)] = &[
    ("exxon", "ENERGY"),
    ("chevron", "ENERGY"),
    ("saudi aramco", "ENERGY"),
    ("nvidia", "TECHNOLOGY"),
    ("microsoft", "TECHNOLOGY"),
    ("apple", "TECHNOLOGY"),
    ("tsmc", "TECHNOLOGY"),
    ("jpmorgan", "FINANCIALS"),
    ("goldman sachs", "FINANCIALS"),
    ("pfizer", "HEALTHCARE"),
    ("moderna", "HEALTHCARE"),
    ("amazon", "CONSUMER"),
    ("walmart", "CONSUMER"),
    ("boeing", "INDUSTRIALS"),
    ("coinbase", "CRYPTO"),
    ("binance", "CRYPTO"),
];
