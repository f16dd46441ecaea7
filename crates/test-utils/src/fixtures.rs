//! Catalog records used across the workspace tests.
//!
//! Records follow the layout of catalog summary files: one JSON object per
//! event whose keys are quantity names holding arrays of observations.
//! Summary records omit photometry and spectra; those only appear in the
//! per-event detail records.

use serde_json::{json, Value};

/// Catalog ids and file layout used by the fixture tree.
pub mod layout {
    pub const SNE: &str = "sne";
    pub const SNE_GRAVEYARD: &str = "sne-graveyard";
    pub const KILONOVA: &str = "kilonova";

    pub const SNE_DIRECTORY: &str = "supernovae";
    pub const KILONOVA_DIRECTORY: &str = "kilonovae";

    pub const SUMMARY_FILE: &str = "catalog.min.json";
    pub const GRAVEYARD_FILE: &str = "bones.min.json";
    pub const DETAIL_SUBDIR: &str = "json";
}

/// Times of the SN2014J spectra in the detail record, in source order.
pub const SN2014J_SPECTRUM_TIMES: [&str; 3] = ["56690.0", "56703.5", "56702.8"];

/// Summary record for SN2014J.
pub fn sn2014j() -> Value {
    json!({
        "name": "SN2014J",
        "alias": [
            {"value": "SN2014J", "source": "1"},
            {"value": "PSN J09554214+6940260", "source": "1"}
        ],
        "claimedtype": [
            {"value": "Ia", "source": "1,2"},
            {"value": "Ia-norm", "source": "3"}
        ],
        "redshift": [
            {"value": "0.000677", "source": "1", "kind": "heliocentric"},
            {"value": "0.0008", "source": "2", "kind": "host"}
        ],
        "lumdist": [
            {"value": "3.5", "u_value": "Mpc", "source": "2"}
        ],
        "ra": [
            {"value": "09:55:42.14", "u_value": "hours", "source": "1"}
        ],
        "dec": [
            {"value": "+69:40:26.0", "u_value": "degrees", "source": "1"}
        ],
        "host": [
            {"value": "M82", "source": "1"}
        ],
        "maxdate": [
            {"value": "2014/02/01", "source": "2"}
        ]
    })
}

/// Summary record for SN2011fe.
pub fn sn2011fe() -> Value {
    json!({
        "name": "SN2011fe",
        "alias": [
            {"value": "SN2011fe", "source": "1"},
            {"value": "PTF11kly", "source": "1"}
        ],
        "claimedtype": [
            {"value": "Ia", "source": "1"}
        ],
        "redshift": [
            {"value": "0.000804", "source": "1"}
        ],
        "lumdist": [
            {"value": "6.4", "u_value": "Mpc", "source": "1"}
        ],
        "ra": [
            {"value": "14:03:05.81", "u_value": "hours", "source": "1"}
        ],
        "dec": [
            {"value": "+54:16:25.4", "u_value": "degrees", "source": "1"}
        ],
        "host": [
            {"value": "M101", "source": "1"}
        ]
    })
}

/// Summary record for SN1987A.
pub fn sn1987a() -> Value {
    json!({
        "name": "SN1987A",
        "alias": [
            {"value": "SN1987A", "source": "1"}
        ],
        "claimedtype": [
            {"value": "II", "source": "1"},
            {"value": "IIpec", "source": "2"}
        ],
        "lumdist": [
            {"value": "0.05", "u_value": "Mpc", "source": "1"}
        ],
        "ra": [
            {"value": "05:35:28.03", "u_value": "hours", "source": "1"}
        ],
        "dec": [
            {"value": "-69:16:11.8", "u_value": "degrees", "source": "1"}
        ],
        "host": [
            {"value": "LMC", "source": "1"}
        ]
    })
}

/// Summary record for ASASSN-14lp (no luminosity distance).
pub fn asassn_14lp() -> Value {
    json!({
        "name": "ASASSN-14lp",
        "alias": [
            {"value": "ASASSN-14lp", "source": "1"}
        ],
        "claimedtype": [
            {"value": "Ia", "source": "1"}
        ],
        "redshift": [
            {"value": "0.0051", "source": "1"}
        ],
        "ra": [
            {"value": "12:45:09.10", "u_value": "hours", "source": "1"}
        ],
        "dec": [
            {"value": "-00:27:32.5", "u_value": "degrees", "source": "1"}
        ]
    })
}

/// Graveyard copy of SN2014J with extra and conflicting values.
pub fn sn2014j_graveyard() -> Value {
    json!({
        "name": "SN2014J",
        "redshift": [
            {"value": "0.00068", "source": "1"}
        ],
        "host": [
            {"value": "NGC 3034", "source": "1"}
        ],
        "discoverer": [
            {"value": "Fossey", "source": "1"}
        ]
    })
}

/// Graveyard-only event.
pub fn sn1000a() -> Value {
    json!({
        "name": "SN1000A",
        "alias": [
            {"value": "SN1000A", "source": "1"}
        ],
        "claimedtype": [
            {"value": "Candidate", "source": "1"}
        ]
    })
}

/// Summary record for AT2017gfo.
pub fn at2017gfo() -> Value {
    json!({
        "name": "AT2017gfo",
        "alias": [
            {"value": "AT2017gfo", "source": "1"},
            {"value": "SSS17a", "source": "1"},
            {"value": "DLT17ck", "source": "2"}
        ],
        "claimedtype": [
            {"value": "Kilonova", "source": "1"}
        ],
        "redshift": [
            {"value": "0.0098", "source": "1"}
        ],
        "lumdist": [
            {"value": "40", "u_value": "Mpc", "source": "1"}
        ],
        "ra": [
            {"value": "13:09:48.09", "u_value": "hours", "source": "1"}
        ],
        "dec": [
            {"value": "-23:22:53.4", "u_value": "degrees", "source": "1"}
        ]
    })
}

/// Summary file contents of the `sne` catalog.
pub fn sne_catalog() -> Value {
    Value::Array(vec![sn2014j(), sn2011fe(), sn1987a(), asassn_14lp()])
}

/// Summary file contents of the `sne-graveyard` catalog.
pub fn sne_graveyard_catalog() -> Value {
    Value::Array(vec![sn2014j_graveyard(), sn1000a()])
}

/// Summary file contents of the `kilonova` catalog.
pub fn kilonova_catalog() -> Value {
    Value::Array(vec![at2017gfo()])
}

/// Full detail record for SN2014J: the summary plus photometry, spectra
/// and the source list the `source` ids point into.
pub fn sn2014j_detail() -> Value {
    let mut detail = sn2014j();
    if let Value::Object(map) = &mut detail {
        map.insert(
            "sources".to_string(),
            json!([
                {"name": "Fossey et al. (2014)", "bibcode": "2014CBET.3792....1F", "alias": "1"},
                {"name": "Goobar et al. (2014)", "bibcode": "2014ApJ...784L..12G", "alias": "2"},
                {"name": "Zheng et al. (2014)", "arxivid": "1401.7968", "alias": "3"},
                {"name": "Tsvetkov et al. (2014)", "bibcode": "2014CoSka..44...67T", "alias": "4"},
                {"name": "ATel 5786", "alias": "5"},
                {"name": "Marion et al. (2015)", "bibcode": "2015ApJ...798...39M", "alias": "6"},
                {"name": "Kast spectrum", "alias": "7"},
                {"name": "SNIFS spectrum", "alias": "8"},
                {"name": "Foley et al. (2014)", "arxivid": "1405.3677", "alias": "9"}
            ]),
        );
        map.insert(
            "photometry".to_string(),
            json!([
                {"time": "56669.6", "magnitude": "10.61", "e_magnitude": "0.03", "band": "B", "source": "4"},
                {"time": "56670.1", "magnitude": "10.45", "band": "V", "source": "4"},
                {"time": "56671.0", "magnitude": "10.20", "e_magnitude": "0.02", "source": "5"},
                {"time": "56672.0", "magnitude": "13.5", "band": "R", "upperlimit": true, "source": "5"},
                {"time": "56673.0", "magnitude": "10.1", "e_magnitude": "0.05", "band": "V", "realization": "1", "source": "6"}
            ]),
        );
        map.insert(
            "spectra".to_string(),
            json!([
                {
                    "time": SN2014J_SPECTRUM_TIMES[0], "u_time": "MJD", "instrument": "Kast",
                    "data": [["3500.0", "1.2e-15"], ["3510.0", "1.3e-15"]],
                    "source": "7"
                },
                {
                    "time": SN2014J_SPECTRUM_TIMES[1], "u_time": "MJD", "instrument": "SNIFS",
                    "data": [["3600.0", "2.2e-15", "1e-17"], ["3610.0", "2.1e-15", "1e-17"]],
                    "source": "8"
                },
                {
                    "time": SN2014J_SPECTRUM_TIMES[2], "u_time": "MJD", "instrument": "STIS",
                    "data": [["2000.0", "4.0e-16"], ["2010.0", "4.1e-16"]],
                    "source": "9"
                }
            ]),
        );
    }
    detail
}
