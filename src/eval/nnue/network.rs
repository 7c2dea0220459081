//! Post-transformer layers and the network file format.
//!
//! Each PSQT bucket owns a small affine stack `2D -> 16 -> 32 -> 1` in
//! i8/i32 quantisation; the 16-bit accumulator halves are clipped to u8
//! before entering it. The transformer's PSQT side channel provides the
//! material half of the output pair.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::accumulator::{Accumulator, AccumulatorStack};
use super::cache::Cache;
use super::features::DIMENSIONS;
use super::transformer::FeatureTransformer;
use super::{FT_BIG, FT_SMALL, LAYER_STACKS, PSQT_BUCKETS};
use crate::board::Position;
use crate::eval::Value;

/// Hidden layer widths of the per-bucket stacks.
pub const L2: usize = 16;
pub const L3: usize = 32;

/// Shift between affine layers and the final output divisor.
const WEIGHT_SCALE_BITS: u32 = 6;
const OUTPUT_SCALE: i32 = 16;

/// Errors on the network file path. Everything else in the crate is
/// total; this is the only operation with genuine I/O failure modes.
#[derive(Debug)]
pub enum NetworkError {
    Io(io::Error),
    HeaderMismatch { expected: u32, found: u32 },
    BadArchitecture(String),
    Truncated,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Io(e) => write!(f, "network file I/O error: {e}"),
            NetworkError::HeaderMismatch { expected, found } => write!(
                f,
                "network header mismatch: expected {expected:#010x}, found {found:#010x}"
            ),
            NetworkError::BadArchitecture(s) => {
                write!(f, "bad network architecture description: {s}")
            }
            NetworkError::Truncated => write!(f, "network file is truncated"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<io::Error> for NetworkError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            NetworkError::Truncated
        } else {
            NetworkError::Io(e)
        }
    }
}

const fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5u32;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

const FEATURE_HASH: u32 = fnv1a(b"HalfKA(mirrored,32 king buckets)");

/// One per-bucket affine stack.
#[derive(Clone)]
pub struct LayerStack {
    pub b1: [i32; L2],
    /// `[L2][2 * D]`
    pub w1: Vec<i8>,
    pub b2: [i32; L3],
    /// `[L3][L2]`
    pub w2: [i8; L3 * L2],
    pub b3: i32,
    pub w3: [i8; L3],
}

impl LayerStack {
    fn zeroed(input_dim: usize) -> Self {
        Self {
            b1: [0; L2],
            w1: vec![0; L2 * input_dim],
            b2: [0; L3],
            w2: [0; L3 * L2],
            b3: 0,
            w3: [0; L3],
        }
    }

    fn propagate(&self, input: &[u8]) -> i32 {
        let mut l1 = [0u8; L2];
        for (k, out) in l1.iter_mut().enumerate() {
            let row = &self.w1[k * input.len()..(k + 1) * input.len()];
            let mut sum = self.b1[k];
            for (&w, &x) in row.iter().zip(input) {
                sum += i32::from(w) * i32::from(x);
            }
            *out = (sum >> WEIGHT_SCALE_BITS).clamp(0, 127) as u8;
        }

        let mut l2 = [0u8; L3];
        for (k, out) in l2.iter_mut().enumerate() {
            let row = &self.w2[k * L2..(k + 1) * L2];
            let mut sum = self.b2[k];
            for (&w, &x) in row.iter().zip(&l1) {
                sum += i32::from(w) * i32::from(x);
            }
            *out = (sum >> WEIGHT_SCALE_BITS).clamp(0, 127) as u8;
        }

        let mut sum = self.b3;
        for (&w, &x) in self.w3.iter().zip(&l2) {
            sum += i32::from(w) * i32::from(x);
        }
        sum / OUTPUT_SCALE
    }
}

/// A complete network of one size: feature transformer plus the
/// per-bucket stacks. Immutable after construction or load.
pub struct Network<const D: usize> {
    pub transformer: FeatureTransformer<D>,
    pub stacks: Vec<LayerStack>,
}

impl<const D: usize> Network<D> {
    pub fn zeroed() -> Self {
        Self {
            transformer: FeatureTransformer::new_zeroed(),
            stacks: (0..LAYER_STACKS).map(|_| LayerStack::zeroed(2 * D)).collect(),
        }
    }

    /// The built-in default parameters: a fixed-seed pseudo-random
    /// feature transformer (so the incremental machinery does real
    /// arithmetic) with zero PSQT and head weights, which makes the
    /// default evaluation identically zero. Real play loads a file.
    pub fn embedded() -> Self {
        let mut net = Self::zeroed();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x6d61_6770_6965 ^ D as u64);
        for w in net.transformer.weights.iter_mut() {
            *w = (rng.next_u32() as i16) % 32;
        }
        for b in net.transformer.biases.iter_mut() {
            *b = (rng.next_u32() as i16) % 32;
        }
        net
    }

    pub fn architecture() -> String {
        format!(
            "HalfKA(mirrored,32 king buckets)[{}->{}x2]->{}->{}->1, {} buckets, psqt {}",
            DIMENSIONS, D, L2, L3, LAYER_STACKS, PSQT_BUCKETS
        )
    }

    /// Header magic: transformer hash xor architecture hash.
    pub fn hash() -> u32 {
        let transformer = FEATURE_HASH ^ (D as u32 * 2);
        let arch = fnv1a(Self::architecture().as_bytes());
        transformer ^ arch
    }

    /// (psqt, positional) for an already-computed accumulator.
    pub fn forward(&self, acc: &Accumulator<D>, pos: &Position) -> (Value, Value) {
        let us = pos.side_to_move() as usize;
        let them = 1 - us;
        let bucket = (pos.occupied().len() as usize - 1) / 4;
        debug_assert!(bucket < LAYER_STACKS);

        let psqt = (acc.psqt[us][bucket] - acc.psqt[them][bucket]) / 2;

        let mut transformed = [0u8; 2 * FT_BIG];
        let input = &mut transformed[..2 * D];
        self.transformer.transform(acc, pos.side_to_move(), input);
        let positional = self.stacks[bucket].propagate(input);

        (psqt, positional)
    }

    pub fn load_file(path: &Path) -> Result<Self, NetworkError> {
        let mut reader = BufReader::new(File::open(path)?);
        let net = Self::load(&mut reader)?;
        log::info!("loaded network {} from {}", Self::architecture(), path.display());
        Ok(net)
    }

    pub fn save_file(&self, path: &Path) -> Result<(), NetworkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Self, NetworkError> {
        let found = read_u32(reader)?;
        let expected = Self::hash();
        if found != expected {
            return Err(NetworkError::HeaderMismatch { expected, found });
        }
        let desc_len = read_u32(reader)? as usize;
        if desc_len > 1024 {
            return Err(NetworkError::BadArchitecture(format!(
                "description length {desc_len}"
            )));
        }
        let mut desc = vec![0u8; desc_len];
        reader.read_exact(&mut desc)?;
        let desc = String::from_utf8(desc)
            .map_err(|_| NetworkError::BadArchitecture("not valid UTF-8".into()))?;
        log::debug!("network description: {desc}");

        let mut net = Self::zeroed();
        read_i16_into(reader, &mut net.transformer.biases)?;
        read_i16_into(reader, &mut net.transformer.weights)?;
        read_i32_into(reader, &mut net.transformer.psqt_weights)?;
        for stack in &mut net.stacks {
            read_i32_into(reader, &mut stack.b1)?;
            read_i8_into(reader, &mut stack.w1)?;
            read_i32_into(reader, &mut stack.b2)?;
            read_i8_into(reader, &mut stack.w2)?;
            stack.b3 = read_u32(reader)? as i32;
            read_i8_into(reader, &mut stack.w3)?;
        }
        Ok(net)
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), NetworkError> {
        writer.write_all(&Self::hash().to_le_bytes())?;
        let desc = Self::architecture();
        writer.write_all(&(desc.len() as u32).to_le_bytes())?;
        writer.write_all(desc.as_bytes())?;

        write_i16(writer, &self.transformer.biases)?;
        write_i16(writer, &self.transformer.weights)?;
        write_i32(writer, &self.transformer.psqt_weights)?;
        for stack in &self.stacks {
            write_i32(writer, &stack.b1)?;
            write_i8(writer, &stack.w1)?;
            write_i32(writer, &stack.b2)?;
            write_i8(writer, &stack.w2)?;
            writer.write_all(&stack.b3.to_le_bytes())?;
            write_i8(writer, &stack.w3)?;
        }
        Ok(())
    }
}

impl Network<FT_BIG> {
    /// Evaluates `pos`, bringing the big accumulator up to date first.
    pub fn evaluate(
        &self,
        pos: &Position,
        stack: &mut AccumulatorStack,
        cache: &mut Cache<FT_BIG>,
    ) -> (Value, Value) {
        stack.ensure_big(pos, &self.transformer, cache);
        self.forward(stack.current_big(), pos)
    }

    /// Pre-computes the current frame so sibling evaluations hit the
    /// incremental path.
    pub fn hint_common_access(
        &self,
        pos: &Position,
        stack: &mut AccumulatorStack,
        cache: &mut Cache<FT_BIG>,
    ) {
        stack.ensure_big(pos, &self.transformer, cache);
    }
}

impl Network<FT_SMALL> {
    pub fn evaluate(
        &self,
        pos: &Position,
        stack: &mut AccumulatorStack,
        cache: &mut Cache<FT_SMALL>,
    ) -> (Value, Value) {
        stack.ensure_small(pos, &self.transformer, cache);
        self.forward(stack.current_small(), pos)
    }

    pub fn hint_common_access(
        &self,
        pos: &Position,
        stack: &mut AccumulatorStack,
        cache: &mut Cache<FT_SMALL>,
    ) {
        stack.ensure_small(pos, &self.transformer, cache);
    }
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, NetworkError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i16_into<R: Read>(r: &mut R, out: &mut [i16]) -> Result<(), NetworkError> {
    let mut bytes = vec![0u8; out.len() * 2];
    r.read_exact(&mut bytes)?;
    for (v, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *v = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
    Ok(())
}

fn read_i32_into<R: Read>(r: &mut R, out: &mut [i32]) -> Result<(), NetworkError> {
    let mut bytes = vec![0u8; out.len() * 4];
    r.read_exact(&mut bytes)?;
    for (v, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *v = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

fn read_i8_into<R: Read>(r: &mut R, out: &mut [i8]) -> Result<(), NetworkError> {
    let mut bytes = vec![0u8; out.len()];
    r.read_exact(&mut bytes)?;
    for (v, &b) in out.iter_mut().zip(&bytes) {
        *v = b as i8;
    }
    Ok(())
}

fn write_i16<W: Write>(w: &mut W, data: &[i16]) -> Result<(), NetworkError> {
    for &v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_i32<W: Write>(w: &mut W, data: &[i32]) -> Result<(), NetworkError> {
    for &v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_i8<W: Write>(w: &mut W, data: &[i8]) -> Result<(), NetworkError> {
    for &v in data {
        w.write_all(&[v as u8])?;
    }
    Ok(())
}
