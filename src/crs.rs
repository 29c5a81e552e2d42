//! # CRS Identifiers
//!
//! Datasets spell the same coordinate reference system in many ways: an
//! `EPSG:4326` code, an OGC URN, a PROJ string or a full WKT definition
//! stored in a grid-mapping variable. [`normalize_crs`] reduces all of them
//! to a canonical `EPSG:<code>` so two extents can be compared.

/// Canonical identifier for WGS 84 longitude/latitude.
pub const WGS84: &str = "EPSG:4326";

const WGS84_ALIASES: [&str; 6] = [
    "OGC:CRS84",
    "CRS84",
    "URN:OGC:DEF:CRS:OGC:1.3:CRS84",
    "URN:OGC:DEF:CRS:OGC::CRS84",
    "WGS84",
    "WGS 84",
];

/// Reduces a CRS identifier to `EPSG:<code>`.
///
/// Axis order is ignored: `OGC:CRS84` and `EPSG:4326` both map to
/// [`WGS84`]. Returns `None` when the identifier is not recognised, in
/// which case two datasets cannot be said to agree or disagree.
pub fn normalize_crs(id: &str) -> Option<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();

    if WGS84_ALIASES.contains(&upper.as_str()) {
        return Some(WGS84.to_string());
    }
    if let Some(code) = upper.strip_prefix("EPSG:") {
        return epsg(code.trim_start_matches(':'));
    }
    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
        // the version field between the colons may be empty
        return rest.rsplit(':').next().and_then(epsg);
    }
    if let Some(rest) = upper.strip_prefix("HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/") {
        return rest.rsplit('/').next().and_then(epsg);
    }
    if upper.starts_with('+') {
        return from_proj(&upper);
    }
    if upper.contains('[') {
        return from_wkt(&upper);
    }
    upper.parse::<u32>().ok().map(|code| format!("EPSG:{}", code))
}

fn epsg(code: &str) -> Option<String> {
    code.trim().parse::<u32>().ok().map(|code| format!("EPSG:{}", code))
}

fn from_proj(proj: &str) -> Option<String> {
    let params: Vec<&str> = proj.split_whitespace().collect();
    if let Some(init) = params.iter().find_map(|p| p.strip_prefix("+INIT=EPSG:")) {
        return epsg(init);
    }
    let longlat = params.iter().any(|p| *p == "+PROJ=LONGLAT" || *p == "+PROJ=LATLONG");
    let wgs84 = params
        .iter()
        .any(|p| *p == "+DATUM=WGS84" || *p == "+ELLPS=WGS84");
    (longlat && wgs84).then(|| WGS84.to_string())
}

/// Code of the outermost `AUTHORITY["EPSG",...]` (WKT1) or `ID["EPSG",...]`
/// (WKT2) node, falling back to a WGS 84 datum name for an unidentified
/// geographic CRS.
fn from_wkt(wkt: &str) -> Option<String> {
    let compact: String = wkt.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.replace('(', "[").replace(')', "]");

    for marker in ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","] {
        for (pos, _) in compact.match_indices(marker) {
            if bracket_depth(&compact[..pos]) != 1 {
                continue;
            }
            let value = &compact[pos + marker.len()..];
            let code: String = value
                .trim_start_matches('"')
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Some(id) = epsg(&code) {
                return Some(id);
            }
        }
    }

    let geographic = ["GEOGCS[", "GEOGCRS[", "GEODCRS[", "GEOGRAPHICCRS["]
        .iter()
        .any(|kw| compact.starts_with(kw));
    let wgs84_datum = ["WGS84", "WGS_1984", "WORLDGEODETICSYSTEM1984"]
        .iter()
        .any(|name| compact.contains(name));
    (geographic && wgs84_datum).then(|| WGS84.to_string())
}

fn bracket_depth(prefix: &str) -> i32 {
    prefix.chars().fold(0, |depth, c| match c {
        '[' => depth + 1,
        ']' => depth - 1,
        _ => depth,
    })
}
