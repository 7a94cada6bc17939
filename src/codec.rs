//! Text encoding of numeric arrays and equal-split partitioning.
//!
//! The macro host can only exchange strings, so every array crosses the
//! boundary as `"1.0, 2.5, -3.0"`: decimal `f64` values separated by a comma
//! and a space, no trailing separator. Rendering uses the shortest
//! representation that parses back to the same value, so
//! `decode(&encode(x)) == x` for every finite `x`.

use crate::error::{Error, Result};

/// Separator between encoded values.
pub const SEPARATOR: &str = ", ";

/// Render `values` as comma-and-space separated text.
pub fn encode(values: &[f64]) -> String {
    let mut text = String::with_capacity(values.len() * 8);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            text.push_str(SEPARATOR);
        }
        // `{:?}` keeps the fractional part (`1.0`) and switches to an
        // exponent for very large or small magnitudes.
        text.push_str(&format!("{value:?}"));
    }
    text
}

/// Parse comma separated text into values.
///
/// Whitespace around each token is ignored; empty or blank text yields an
/// empty buffer.
///
/// # Errors
///
/// [`Error::Parse`] for the first token that is not a number.
pub fn decode(text: &str) -> Result<Vec<f64>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|token| {
            let token = token.trim();
            token.parse::<f64>().map_err(|_| Error::Parse {
                token: token.to_string(),
            })
        })
        .collect()
}

/// Element counts one participant sends and receives in an equal split.
///
/// Every participant gets `total / participants` elements; rank 0 also takes
/// the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Elements contributed by this rank.
    pub send_count: usize,
    /// Elements delivered to this rank.
    pub receive_count: usize,
}

impl Partition {
    /// Partition of `total` elements for `rank` out of `participants`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCount`] if `participants` is zero,
    /// [`Error::InvalidRank`] if `rank` is not below `participants`.
    pub fn new(total: usize, participants: usize, rank: usize) -> Result<Self> {
        if participants == 0 {
            return Err(Error::InvalidCount(0));
        }
        if rank >= participants {
            return Err(Error::InvalidRank(rank as i32));
        }
        let mut count = total / participants;
        if rank == 0 {
            count += total % participants;
        }
        Ok(Partition {
            send_count: count,
            receive_count: count,
        })
    }

    /// Per-rank counts for ranks `0..participants`; they sum to `total`.
    pub fn counts(total: usize, participants: usize) -> Result<Vec<usize>> {
        (0..participants)
            .map(|rank| Partition::new(total, participants, rank).map(|p| p.send_count))
            .collect::<Result<Vec<_>>>()
            .and_then(|counts| {
                if counts.is_empty() {
                    Err(Error::InvalidCount(0))
                } else {
                    Ok(counts)
                }
            })
    }

    /// Offsets of contiguous segments with the given lengths.
    pub fn displacements(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .scan(0usize, |acc, &count| {
                let displ = *acc;
                *acc += count;
                Some(displ)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn encode_format() {
        assert_eq!(encode(&[]), "");
        assert_eq!(encode(&[1.0]), "1.0");
        assert_eq!(encode(&[1.0, 2.5, -3.0]), "1.0, 2.5, -3.0");
        assert_eq!(encode(&[0.1]), "0.1");
    }

    #[test]
    fn decode_accepts_host_text() {
        assert_eq!(decode("1.0, 2.5, -3").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(decode("4,5,6").unwrap(), vec![4.0, 5.0, 6.0]);
        assert_eq!(decode(" 7.25 ").unwrap(), vec![7.25]);
        assert_eq!(decode("1E3, 2e-2").unwrap(), vec![1000.0, 0.02]);
    }

    #[test]
    fn decode_empty_text() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("   ").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        match decode("1.0, abc, 3.0") {
            Err(Error::Parse { token }) => assert_eq!(token, "abc"),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(decode("1.0, 2.0, "), Err(Error::Parse { .. })));
    }

    #[test]
    fn round_trip_is_exact() {
        let mut rng = rand::thread_rng();
        let mut values: Vec<f64> = (0..500)
            .map(|_| rng.gen::<f64>() * 10f64.powi(rng.gen_range(-300..300)))
            .collect();
        values.extend([0.0, -0.0, f64::MIN_POSITIVE, f64::MAX, f64::MIN, 1.0 / 3.0]);

        let decoded = decode(&encode(&values)).unwrap();
        assert_eq!(decoded.len(), values.len());
        for (a, b) in values.iter().zip(&decoded) {
            assert_eq!(a.to_bits(), b.to_bits(), "{a} re-parsed as {b}");
        }
    }

    #[test]
    fn ten_over_three() {
        assert_eq!(Partition::counts(10, 3).unwrap(), vec![4, 3, 3]);
        assert_eq!(
            Partition::new(10, 3, 0).unwrap(),
            Partition {
                send_count: 4,
                receive_count: 4
            }
        );
        assert_eq!(Partition::new(10, 3, 2).unwrap().receive_count, 3);
        assert_eq!(Partition::displacements(&[4, 3, 3]), vec![0, 4, 7]);
    }

    #[test]
    fn counts_always_sum_to_total() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let total = rng.gen_range(0..10_000);
            let participants = rng.gen_range(1..64);
            let counts = Partition::counts(total, participants).unwrap();
            assert_eq!(counts.iter().sum::<usize>(), total);

            let base = total / participants;
            assert_eq!(counts[0], base + total % participants);
            assert!(counts[1..].iter().all(|&c| c == base));
        }
    }

    #[test]
    fn fewer_elements_than_participants() {
        assert_eq!(Partition::counts(2, 4).unwrap(), vec![2, 0, 0, 0]);
        assert_eq!(Partition::counts(0, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn invalid_partitions() {
        assert!(matches!(Partition::new(5, 0, 0), Err(Error::InvalidCount(0))));
        assert!(matches!(Partition::new(5, 2, 2), Err(Error::InvalidRank(2))));
        assert!(Partition::counts(5, 0).is_err());
    }
}
