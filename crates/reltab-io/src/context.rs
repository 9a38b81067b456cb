//! Context payload: the string count followed by every string in code order.

use reltab_core::context::Context;

use crate::error::Result;
use crate::wire::{Decoder, Encoder};

pub fn encode_context(context: &Context) -> Vec<u8> {
    let pool = context.read();
    let mut enc = Encoder::new();
    enc.u64(pool.len() as u64);
    for s in pool.strings() {
        enc.str(s);
    }
    enc.into_bytes()
}

pub fn decode_context(payload: &[u8]) -> Result<Context> {
    let mut dec = Decoder::new(payload);
    let n = dec.count(4)?;
    let strings = (0..n).map(|_| dec.str()).collect::<Result<Vec<_>>>()?;
    dec.finish()?;
    Ok(Context::from_strings(strings)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_survive() {
        let ctx = Context::new();
        let codes: Vec<_> = ["x", "", "ünï"].iter().map(|s| ctx.intern(s).unwrap()).collect();
        let back = decode_context(&encode_context(&ctx)).unwrap();
        assert_eq!(back.len(), 3);
        for (s, c) in ["x", "", "ünï"].iter().zip(codes) {
            assert_eq!(back.lookup(s), Some(c));
        }
        assert!(!back.same_as(&ctx));
    }

    #[test]
    fn duplicate_strings_are_rejected() {
        let mut enc = Encoder::new();
        enc.u64(2).str("a").str("a");
        assert!(decode_context(&enc.into_bytes()).is_err());
    }
}
