// Cryptographic signing module
// This file defines the signer capability consumed by the execution supervisor and a
// local-key implementation that produces zkSync EIP-712 (type 0x71) transactions
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::sponsorship::SponsoredTransactionRequest;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, sol, SolStruct};
use async_trait::async_trait;
use std::str::FromStr;

/// zkSync EIP-712 transaction type.
pub const EIP712_TX_TYPE: u8 = 0x71;

sol! {
    /// zkSync's typed transaction struct; addresses are widened to uint256.
    struct Transaction {
        uint256 txType;
        uint256 from;
        uint256 to;
        uint256 gasLimit;
        uint256 gasPerPubdataByteLimit;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        uint256 paymaster;
        uint256 nonce;
        uint256 value;
        bytes data;
        bytes32[] factoryDeps;
        bytes paymasterInput;
    }
}

/// Turns a sponsored request into raw, broadcastable bytes. Key material never leaves the
/// implementation.
#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign(&self, request: &SponsoredTransactionRequest) -> Result<Bytes, AggrError>;
}

fn widen(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

/// EIP-712 digest the account signs for `request`.
pub fn signing_hash(request: &SponsoredTransactionRequest) -> B256 {
    let tx = Transaction {
        txType: U256::from(EIP712_TX_TYPE),
        from: widen(request.from),
        to: widen(request.to),
        gasLimit: request.gas_limit,
        gasPerPubdataByteLimit: U256::from(request.gas_per_pubdata),
        maxFeePerGas: request.max_fee_per_gas,
        maxPriorityFeePerGas: request.max_priority_fee_per_gas,
        paymaster: widen(request.sponsor.address),
        nonce: U256::from(request.nonce),
        value: request.value,
        data: request.data.clone(),
        factoryDeps: Vec::new(),
        paymasterInput: request.sponsor.input.clone(),
    };
    let domain = eip712_domain! {
        name: "zkSync",
        version: "2",
        chain_id: request.chain_id,
    };
    tx.eip712_signing_hash(&domain)
}

/// `0x71 || rlp([...])` envelope with the custom signature and paymaster params.
fn encode_envelope(
    request: &SponsoredTransactionRequest,
    y_parity: bool,
    r: U256,
    s: U256,
    custom_signature: Bytes,
) -> Bytes {
    let mut payload = Vec::new();
    request.nonce.encode(&mut payload);
    request.max_priority_fee_per_gas.encode(&mut payload);
    request.max_fee_per_gas.encode(&mut payload);
    request.gas_limit.encode(&mut payload);
    request.to.encode(&mut payload);
    request.value.encode(&mut payload);
    request.data.encode(&mut payload);
    (y_parity as u8).encode(&mut payload);
    r.encode(&mut payload);
    s.encode(&mut payload);
    request.chain_id.encode(&mut payload);
    request.from.encode(&mut payload);
    request.gas_per_pubdata.encode(&mut payload);
    Vec::<Bytes>::new().encode(&mut payload);
    custom_signature.encode(&mut payload);

    let mut paymaster_params = Vec::new();
    request.sponsor.address.encode(&mut paymaster_params);
    request.sponsor.input.encode(&mut paymaster_params);
    Header {
        list: true,
        payload_length: paymaster_params.len(),
    }
    .encode(&mut payload);
    payload.extend_from_slice(&paymaster_params);

    let mut out = vec![EIP712_TX_TYPE];
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out.into()
}

/// Signer backed by an in-process secp256k1 key.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn from_hex(secret_hex: &str) -> Result<Self, AggrError> {
        let inner = PrivateKeySigner::from_str(secret_hex.trim().trim_start_matches("0x"))
            .map_err(|e| AggrError::Signing(format!("bad hex key: {e}")))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign(&self, request: &SponsoredTransactionRequest) -> Result<Bytes, AggrError> {
        if request.from != self.inner.address() {
            return Err(AggrError::Signing(format!(
                "request from {} but key controls {}",
                request.from,
                self.inner.address()
            )));
        }
        let hash = signing_hash(request);
        let signature = self
            .inner
            .sign_hash_sync(&hash)
            .map_err(|e| AggrError::Signing(e.to_string()))?;
        let custom = Bytes::copy_from_slice(&signature.as_bytes());
        Ok(encode_envelope(
            request,
            signature.v(),
            signature.r(),
            signature.s(),
            custom,
        ))
    }
}
