//! Block wire format for a flushed buffer of samples: a flat sequence of
//! `(timestamp: i64 LE, value: f64 LE)` pairs. Compression and on-disk
//! layout are out of scope here; this is the minimal encoding needed to
//! recover a watermark from existing roots.

const RECORD_LEN: usize = 16;

pub fn encode_block(samples: &[(i64, f64)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * RECORD_LEN);
    for (ts, value) in samples {
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

pub fn decode_block(block: &[u8]) -> Vec<(i64, f64)> {
    block
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let ts = i64::from_le_bytes(chunk[..8].try_into().expect("8 bytes"));
            let value = f64::from_le_bytes(chunk[8..].try_into().expect("8 bytes"));
            (ts, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let samples = vec![(1i64, 1.5f64), (2, -3.25), (100, 0.0)];
        let block = encode_block(&samples);
        assert_eq!(decode_block(&block), samples);
    }
}
