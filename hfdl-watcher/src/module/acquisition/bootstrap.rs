///! Every allocated HFDL ground station and its assigned frequencies (kHz).
///!
///! An allocation says nothing about what is on air right now; this table
///! only exists to get the decoder listening before anything better is known.

use hfdl_common::StationId;

use crate::model::{Station, StationSnapshot};

const ALLOCATIONS: &[(StationId, &str, &[u64])] = &[
    (1, "San Francisco, California", &[21934, 17919, 12276, 11327, 10081, 8927, 6559, 5508]),
    (
        2,
        "Molokai, Hawaii",
        &[21937, 17919, 13324, 13312, 13276, 11348, 11312, 10027, 8936, 8912, 6565, 5514],
    ),
    (3, "Reykjavik, Iceland", &[17985, 15025, 11184, 8977, 6712, 5720, 3900]),
    (4, "Riverhead, New York", &[21931, 17919, 13276, 11387, 8912, 6661, 5652]),
    (5, "Auckland, New Zealand", &[17916, 13351, 10084, 8921, 6535, 5583]),
    (6, "Hat Yai, Thailand", &[21949, 17928, 13270, 10066, 8825, 6535, 5655]),
    (7, "Shannon, Ireland", &[11384, 10081, 8942, 8843, 6532, 5547, 3455, 2998]),
    (8, "Johannesburg, South Africa", &[21949, 17922, 13321, 11321, 8834, 5529, 4681, 3016]),
    (
        9,
        "Barrow, Alaska",
        &[
            21937, 21928, 17934, 17919, 11354, 10093, 10027, 8936, 8927, 6646, 5544, 5538, 5529, 4687, 4654, 3497,
            3007, 2992, 2944,
        ],
    ),
    (10, "Muan, South Korea", &[21931, 17958, 13342, 10060, 8939, 6619, 5502, 2941]),
    (11, "Albrook, Panama", &[17901, 13264, 10063, 8894, 6589, 5589]),
    (13, "Santa Cruz, Bolivia", &[21997, 17916, 13315, 11318, 8957, 6628, 4660]),
    (14, "Krasnoyarsk, Russia", &[21990, 17912, 13321, 10087, 8886, 6596, 5622]),
    (15, "Al Muharraq, Bahrain", &[21982, 17967, 13354, 10075, 8885, 5544]),
    (16, "Agana, Guam", &[21928, 17919, 13312, 11306, 8927, 6652, 5451]),
    (17, "Canarias, Spain", &[21955, 17928, 13303, 11348, 8948, 6529]),
];

/// The allocation table as a snapshot. Stations carry no update time.
pub fn bootstrap_snapshot() -> StationSnapshot {
    ALLOCATIONS
        .iter()
        .map(|(id, name, khz)| Station::new(*id, *name).with_frequencies(khz.iter().map(|k| k * 1000)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_table() {
        let snapshot = bootstrap_snapshot();
        assert_eq!(snapshot.len(), 16);
        assert!(snapshot.get(12).is_none());
        assert!(snapshot.stations().all(|s| !s.frequencies.is_empty()));
        assert!(snapshot.get(7).unwrap().frequencies.contains(&8_942_000));
    }
}
