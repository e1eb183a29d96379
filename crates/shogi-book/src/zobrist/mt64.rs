//! MT19937-64（C++ `std::mt19937_64` 互換）
//!
//! Apery 定跡キーの乱数テーブルは C++ 実装が `std::mt19937_64` を
//! 既定シードで回した列から生成する。ここではその列をビット単位で
//! 再現する必要があるため、互換の生成器を実装する。

const NN: usize = 312;
const MM: usize = 156;
const MATRIX_A: u64 = 0xB502_6F5A_A966_19E9;
const UPPER_MASK: u64 = 0xFFFF_FFFF_8000_0000;
const LOWER_MASK: u64 = 0x0000_0000_7FFF_FFFF;

/// `std::mt19937_64` の default_seed
pub const DEFAULT_SEED: u64 = 5489;

pub struct Mt19937_64 {
    mt: [u64; NN],
    mti: usize,
}

impl Mt19937_64 {
    pub fn new(seed: u64) -> Self {
        let mut mt = [0u64; NN];
        mt[0] = seed;
        for i in 1..NN {
            mt[i] = 6_364_136_223_846_793_005u64
                .wrapping_mul(mt[i - 1] ^ (mt[i - 1] >> 62))
                .wrapping_add(i as u64);
        }
        Self { mt, mti: NN }
    }

    pub fn next_u64(&mut self) -> u64 {
        if self.mti >= NN {
            self.update();
        }
        let mut x = self.mt[self.mti];
        self.mti += 1;

        // tempering
        x ^= (x >> 29) & 0x5555_5555_5555_5555;
        x ^= (x << 17) & 0x71D6_7FFF_EDA6_0000;
        x ^= (x << 37) & 0xFFF7_EEE0_0000_0000;
        x ^= x >> 43;
        x
    }

    fn update(&mut self) {
        for i in 0..NN {
            let x = (self.mt[i] & UPPER_MASK) | (self.mt[(i + 1) % NN] & LOWER_MASK);
            let mut x_a = x >> 1;
            if x & 1 != 0 {
                x_a ^= MATRIX_A;
            }
            self.mt[i] = self.mt[(i + MM) % NN] ^ x_a;
        }
        self.mti = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        // C++ 規格が定める検査値: 既定シードで 10000 番目の出力
        let mut mt = Mt19937_64::new(DEFAULT_SEED);
        let mut value = 0;
        for _ in 0..10000 {
            value = mt.next_u64();
        }
        assert_eq!(value, 9_981_545_732_273_789_042);
    }
}
