//! Multicall codec.
//!
//! A [`MultiCallBatch`] is an ordered set of named read-only contract calls.
//! [`MultiCallBatch::encode`] turns it into the `Call[]` argument of
//! `Multicall.aggregate`, and [`MultiCallBatch::decode`] walks the returned
//! `bytes[]` in the same order, ABI-decoding every entry with its declared
//! return types and handing the values to the entry's callback.

use std::{collections::BTreeMap, fmt};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt},
    json_abi::Function,
    primitives::{Address, Bytes, U256},
};

use crate::{error::CodecError, interfaces::Multicall};

type Callback<T> = Box<dyn Fn(&[DynSolValue]) -> Result<T, CodecError> + Send + Sync>;

/// Declared return shape of a call: the ordered ABI types plus a callback
/// mapping the decoded values into an application value.
pub struct Returns<T> {
    params: Vec<DynSolType>,
    callback: Callback<T>,
}

impl<T> Returns<T> {
    pub fn new<F>(params: &[&str], callback: F) -> Result<Self, CodecError>
    where
        F: Fn(&[DynSolValue]) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let params = params
            .iter()
            .map(|ty| {
                DynSolType::parse(ty).map_err(|e| CodecError::Type {
                    ty: (*ty).to_owned(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            params,
            callback: Box::new(callback),
        })
    }
}

/// A single named contract call.
pub struct MultiCallParams<T> {
    pub address: Address,
    function: Function,
    values: Vec<DynSolValue>,
    returns: Returns<T>,
}

impl<T> MultiCallParams<T> {
    /// `signature` is a human readable function signature such as
    /// `balanceOf(address)`.
    pub fn new(
        address: Address,
        signature: &str,
        values: Vec<DynSolValue>,
        returns: Returns<T>,
    ) -> Result<Self, CodecError> {
        let function = Function::parse(signature).map_err(|e| CodecError::Signature {
            signature: signature.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            address,
            function,
            values,
            returns,
        })
    }

    pub fn signature(&self) -> String {
        self.function.signature()
    }

    fn call_data(&self, name: &str) -> Result<Bytes, CodecError> {
        self.function
            .abi_encode_input(&self.values)
            .map(Bytes::from)
            .map_err(|source| CodecError::Abi {
                call: name.to_owned(),
                source,
            })
    }

    fn decode(&self, name: &str, data: &[u8]) -> Result<T, CodecError> {
        let decoded = DynSolType::Tuple(self.returns.params.clone())
            .abi_decode_params(data)
            .map_err(|source| CodecError::Abi {
                call: name.to_owned(),
                source,
            })?;

        let values = match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        };

        (self.returns.callback)(&values)
    }
}

impl<T> fmt::Debug for MultiCallParams<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiCallParams")
            .field("address", &self.address)
            .field("function", &self.signature())
            .field("values", &self.values)
            .field("returns", &self.returns.params)
            .finish()
    }
}

/// Named calls in insertion order. The order is load-bearing: results come
/// back from the aggregator positionally.
pub struct MultiCallBatch<T> {
    calls: Vec<(String, MultiCallParams<T>)>,
}

impl<T> Default for MultiCallBatch<T> {
    fn default() -> Self {
        Self { calls: Vec::new() }
    }
}

impl<T> MultiCallBatch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call. Names key the decoded results, so they must be unique.
    pub fn push(&mut self, name: impl Into<String>, params: MultiCallParams<T>) -> Result<&mut Self, CodecError> {
        let name = name.into();
        if self.calls.iter().any(|(existing, _)| *existing == name) {
            return Err(CodecError::DuplicateCall(name));
        }

        self.calls.push((name, params));
        Ok(self)
    }

    /// Build the `Call[]` argument of `Multicall.aggregate`.
    pub fn encode(&self) -> Result<Vec<Multicall::Call>, CodecError> {
        self.calls
            .iter()
            .map(|(name, params)| {
                Ok(Multicall::Call {
                    target: params.address,
                    callData: params.call_data(name)?,
                })
            })
            .collect()
    }

    /// Decode the `returnData` of `Multicall.aggregate`, keyed by call name.
    pub fn decode(&self, return_data: &[Bytes]) -> Result<BTreeMap<String, T>, CodecError> {
        if return_data.len() != self.calls.len() {
            return Err(CodecError::ResultCount {
                expected: self.calls.len(),
                actual: return_data.len(),
            });
        }

        self.calls
            .iter()
            .zip(return_data)
            .map(|((name, params), data)| Ok((name.clone(), params.decode(name, data)?)))
            .collect()
    }
}

impl<T> fmt::Debug for MultiCallBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.calls.iter().map(|(name, params)| (name, params)))
            .finish()
    }
}

// Helpers for return callbacks.

pub fn uint_at(values: &[DynSolValue], index: usize, call: &str) -> Result<U256, CodecError> {
    values
        .get(index)
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| CodecError::Shape {
            call: call.to_owned(),
            expected: "uint",
        })
}

pub fn int_at(values: &[DynSolValue], index: usize, call: &str) -> Result<i64, CodecError> {
    values
        .get(index)
        .and_then(DynSolValue::as_int)
        .and_then(|(value, _)| i64::try_from(value).ok())
        .ok_or_else(|| CodecError::Shape {
            call: call.to_owned(),
            expected: "int",
        })
}

pub fn bool_at(values: &[DynSolValue], index: usize, call: &str) -> Result<bool, CodecError> {
    values
        .get(index)
        .and_then(DynSolValue::as_bool)
        .ok_or_else(|| CodecError::Shape {
            call: call.to_owned(),
            expected: "bool",
        })
}

pub fn address_at(
    values: &[DynSolValue],
    index: usize,
    call: &str,
) -> Result<Address, CodecError> {
    values
        .get(index)
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| CodecError::Shape {
            call: call.to_owned(),
            expected: "address",
        })
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{address, I256},
        sol,
        sol_types::SolCall,
    };

    use super::*;

    sol! {
        function balanceOf(address owner) external view returns (uint256);
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
    }

    const TOKEN: Address = address!("469eda64aed3a3ad6f868c44564291aa415cb1d9");
    const POOL: Address = address!("07aa6584385cca15c2c6e13a5599ffc2d177e33b");
    const OWNER: Address = address!("00000000000000000000000000000000000000ab");

    #[derive(Debug, PartialEq)]
    enum Value {
        Balance(U256),
        Price { sqrt_price: U256, tick: i64 },
    }

    fn batch() -> MultiCallBatch<Value> {
        let mut batch = MultiCallBatch::new();
        batch.push(
            "balance",
            MultiCallParams::new(
                TOKEN,
                "balanceOf(address)",
                vec![DynSolValue::Address(OWNER)],
                Returns::new(&["uint256"], |values| {
                    Ok(Value::Balance(uint_at(values, 0, "balance")?))
                })
                .unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
        batch.push(
            "pool",
            MultiCallParams::new(
                POOL,
                "slot0()",
                vec![],
                Returns::new(
                    &["uint160", "int24", "uint16", "uint16", "uint16", "uint8", "bool"],
                    |values| {
                        Ok(Value::Price {
                            sqrt_price: uint_at(values, 0, "pool")?,
                            tick: int_at(values, 1, "pool")?,
                        })
                    },
                )
                .unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
        batch
    }

    #[test]
    fn test_encode_preserves_order_and_selectors() {
        let calls = batch().encode().unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, TOKEN);
        assert_eq!(
            calls[0].callData,
            Bytes::from(balanceOfCall { owner: OWNER }.abi_encode())
        );
        assert_eq!(calls[1].target, POOL);
        assert_eq!(&calls[1].callData[..4], &slot0Call::SELECTOR[..]);
    }

    #[test]
    fn test_decode_round_trip() {
        let batch = batch();
        let _ = batch.encode().unwrap();

        let balance = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(1234u64), 256)]);
        let slot0 = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(79228162514264337593543950336u128), 160),
            DynSolValue::Int(I256::try_from(-887i64).unwrap(), 24),
            DynSolValue::Uint(U256::from(1u8), 16),
            DynSolValue::Uint(U256::from(1u8), 16),
            DynSolValue::Uint(U256::from(1u8), 16),
            DynSolValue::Uint(U256::ZERO, 8),
            DynSolValue::Bool(true),
        ]);
        let return_data = vec![
            Bytes::from(balance.abi_encode_params()),
            Bytes::from(slot0.abi_encode_params()),
        ];

        let decoded = batch.decode(&return_data).unwrap();

        assert_eq!(
            decoded.get("balance"),
            Some(&Value::Balance(U256::from(1234u64)))
        );
        assert_eq!(
            decoded.get("pool"),
            Some(&Value::Price {
                sqrt_price: U256::from(79228162514264337593543950336u128),
                tick: -887,
            })
        );
    }

    #[test]
    fn test_decode_result_count_mismatch() {
        let err = batch().decode(&[Bytes::new()]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ResultCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_decode_bad_layout_fails() {
        let batch = batch();
        let return_data = vec![Bytes::from(vec![0u8; 4]), Bytes::new()];
        assert!(matches!(
            batch.decode(&return_data),
            Err(CodecError::Abi { .. })
        ));
    }

    #[test]
    fn test_invalid_signature_and_type() {
        assert!(matches!(
            Returns::<()>::new(&["uint257x"], |_| Ok(())),
            Err(CodecError::Type { .. })
        ));

        let returns = Returns::new(&["uint256"], |_| Ok(())).unwrap();
        assert!(matches!(
            MultiCallParams::new(TOKEN, "balanceOf(address", vec![], returns),
            Err(CodecError::Signature { .. })
        ));
    }

    #[test]
    fn test_push_rejects_duplicate_names() {
        let mut batch = batch();
        let params = MultiCallParams::new(
            TOKEN,
            "balanceOf(address)",
            vec![DynSolValue::Address(OWNER)],
            Returns::new(&["uint256"], |values| {
                Ok(Value::Balance(uint_at(values, 0, "balance")?))
            })
            .unwrap(),
        )
        .unwrap();

        let err = batch.push("balance", params).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateCall(name) if name == "balance"));
        assert_eq!(batch.encode().unwrap().len(), 2);
    }

    #[test]
    fn test_encode_rejects_mismatched_values() {
        let mut batch = MultiCallBatch::new();
        batch.push(
            "balance",
            MultiCallParams::new(
                TOKEN,
                "balanceOf(address)",
                vec![DynSolValue::Bool(true)],
                Returns::new(&["uint256"], |_| Ok(())).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
        assert!(matches!(batch.encode(), Err(CodecError::Abi { .. })));
    }
}
