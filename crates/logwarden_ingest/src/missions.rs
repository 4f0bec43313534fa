//! Mission id normalization and difficulty tiers.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static MISSION_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("GA_Airport_mis_01_SFPSACMission", "Airport Mission #1"),
        ("GA_Airport_mis_02_SFPSACMission", "Airport Mission #2"),
        ("GA_Airport_mis_03_SFPSACMission", "Airport Mission #3"),
        ("GA_Airport_mis_04_SFPSACMission", "Airport Mission #4"),
        ("GA_Military_02_Mis1", "Military Base Mission #2"),
        ("GA_Military_03_Mis_01", "Military Base Mission #3"),
        ("GA_Military_04_Mis1", "Military Base Mission #4"),
        ("GA_Military_04_Mis_2", "Military Base Mission #4B"),
        ("GA_Beregovoy_Mis1", "Beregovoy Settlement Mission"),
        ("GA_Settle_05_ChernyLog_Mis1", "Cherny Log Settlement Mission"),
        ("GA_Settle_09_Mis_1", "Settlement Mission #9"),
        ("GA_Ind_01_m1", "Industrial Zone Mission #1"),
        ("GA_Ind_02_Mis_1", "Industrial Zone Mission #2"),
        ("GA_PromZone_6_Mis_1", "Industrial Zone Mission #6"),
        ("GA_PromZone_Mis_01", "Industrial Zone Mission A"),
        ("GA_PromZone_Mis_02", "Industrial Zone Mission B"),
        ("GA_KhimMash_Mis_01", "Chemical Plant Mission #1"),
        ("GA_KhimMash_Mis_02", "Chemical Plant Mission #2"),
        ("GA_Bunker_01_Mis1", "Underground Bunker Mission"),
        ("GA_Sawmill_01_Mis1", "Sawmill Mission #1"),
        ("GA_Sawmill_02_1_Mis1", "Sawmill Mission #2A"),
        ("GA_Sawmill_03_Mis_01", "Sawmill Mission #3"),
        ("GA_Kamensk_Ind_3_Mis_1", "Kamensk Industrial Mission"),
        ("GA_Kamensk_Mis_1", "Kamensk City Mission #1"),
        ("GA_Kamensk_Mis_2", "Kamensk City Mission #2"),
        ("GA_Kamensk_Mis_3", "Kamensk City Mission #3"),
        ("GA_Krasnoe_Mis_1", "Krasnoe City Mission"),
        ("GA_Vostok_Mis_1", "Vostok City Mission"),
        ("GA_Lighthouse_02_Mis1", "Lighthouse Mission #2"),
        ("GA_Elevator_Mis_1", "Elevator Complex Mission #1"),
        ("GA_Elevator_Mis_2", "Elevator Complex Mission #2"),
        ("GA_Bochki_Mis_1", "Barrel Storage Mission"),
        ("GA_Dubovoe_0_Mis_1", "Dubovoe Resource Mission"),
    ])
});

/// Substring -> template prefix for ids missing from the table. First hit wins.
const FALLBACK_TEMPLATES: &[(&[&str], &str)] = &[
    (&["_Airport_"], "Airport Mission"),
    (&["_Military_"], "Military Mission"),
    (&["_Ind_", "_PromZone_"], "Industrial Mission"),
    (&["_KhimMash_"], "Chemical Plant Mission"),
    (&["_Bunker_"], "Bunker Mission"),
    (&["_Sawmill_"], "Sawmill Mission"),
    (&["_Settle_"], "Settlement Mission"),
];

/// Lowercase keywords per tier, highest tier first.
const LEVEL_KEYWORDS: &[(u8, &[&str])] = &[
    (5, &["military", "bunker", "khimmash"]),
    (4, &["airport", "promzone", "kamensk"]),
    (3, &["ind_", "industrial"]),
    (2, &["sawmill", "lighthouse", "elevator"]),
];

/// Human-readable name for a mission id.
pub fn normalize_mission_name(mission_id: &str) -> String {
    if let Some(name) = MISSION_NAMES.get(mission_id) {
        return (*name).to_string();
    }

    for (needles, template) in FALLBACK_TEMPLATES {
        if needles.iter().any(|needle| mission_id.contains(needle)) {
            let suffix = mission_id.rsplit('_').next().unwrap_or(mission_id);
            return format!("{} ({})", template, suffix);
        }
    }

    let stripped = mission_id
        .replace("GA_", "")
        .replace("_Mis", "")
        .replace("_mis", "");
    let readable: Vec<String> = stripped
        .split('_')
        .filter(|part| !part.is_empty() && part.chars().all(char::is_alphabetic))
        .map(capitalize)
        .collect();

    if readable.is_empty() {
        format!("Mission ({})", mission_id)
    } else {
        format!("{} Mission", readable.join(" "))
    }
}

/// Difficulty tier 1..=5 from substrings of the id.
pub fn mission_level(mission_id: &str) -> u8 {
    let lower = mission_id.to_ascii_lowercase();
    LEVEL_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(level, _)| *level)
        .unwrap_or(1)
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
