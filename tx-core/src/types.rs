//! Core transaction and account types
//!
//! All types are designed for:
//! - Deterministic serialization (fixed wire layout, hex for human-readable)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (integer atomics, checked operations)

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Suffix character appended to the numeric part of every account address.
pub const ADDRESS_SUFFIX: char = 'M';

/// Ed25519 public key (32 bytes)
///
/// Serializes as a hex string in human-readable formats (JSON, TOML) and as
/// raw bytes in binary formats (bincode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let raw = hex::decode(s).map_err(|e| format!("invalid hex: {}", e))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| "public key must be 32 bytes".to_string())?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a 32-byte public key (hex string or raw bytes)")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PublicKey, E> {
                PublicKey::from_hex(v).map_err(de::Error::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<PublicKey, E> {
                let bytes: [u8; 32] = v
                    .try_into()
                    .map_err(|_| de::Error::custom("public key must be 32 bytes"))?;
                Ok(PublicKey(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(KeyVisitor)
        } else {
            deserializer.deserialize_bytes(KeyVisitor)
        }
    }
}

/// Ed25519 signature (64 bytes)
///
/// Same serialization convention as [`PublicKey`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let raw = hex::decode(s).map_err(|e| format!("invalid hex: {}", e))?;
        let bytes: [u8; 64] = raw
            .try_into()
            .map_err(|_| "signature must be 64 bytes".to_string())?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// All-zero placeholder, used before a transaction is signed
    pub fn zero() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SigVisitor;

        impl<'de> Visitor<'de> for SigVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a 64-byte signature (hex string or raw bytes)")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Signature, E> {
                Signature::from_hex(v).map_err(de::Error::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Signature, E> {
                let bytes: [u8; 64] = v
                    .try_into()
                    .map_err(|_| de::Error::custom("signature must be 64 bytes"))?;
                Ok(Signature(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(SigVisitor)
        } else {
            deserializer.deserialize_bytes(SigVisitor)
        }
    }
}

/// Account address: a decimal-rendered u64 plus the network suffix character
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Build from the numeric address form
    pub fn from_numeric(n: u64) -> Self {
        Self(format!("{}{}", n, ADDRESS_SUFFIX))
    }

    /// Parse and validate an address string
    ///
    /// Accepts `<decimal u64><suffix>` with a case-insensitive suffix.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut chars = s.chars();
        let suffix = chars
            .next_back()
            .ok_or_else(|| "address must not be empty".to_string())?;
        if !suffix.eq_ignore_ascii_case(&ADDRESS_SUFFIX) {
            return Err(format!(
                "address must end with '{}': {}",
                ADDRESS_SUFFIX, s
            ));
        }
        let digits = chars.as_str();
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("address numeric part is not a valid u64: {}", s))?;
        Ok(Self::from_numeric(n))
    }

    /// Numeric part of the address
    pub fn numeric(&self) -> Result<u64, String> {
        self.0[..self.0.len() - 1]
            .parse()
            .map_err(|_| format!("malformed address: {}", self.0))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive equality, used for sender address verification
    pub fn eq_ignore_case(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical transaction identifier
///
/// A decimal string derived from the signed byte encoding (see
/// [`crate::codec::transaction_id`]). Never trusted from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an already-derived id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction kind tag, selecting a registry handler
///
/// Serializes as the numeric wire tag in every format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum TransactionType {
    /// Value transfer between accounts
    Transfer = 0,
    /// Second-factor signature registration
    SecondSignature = 1,
    /// Delegate registration
    Delegate = 2,
    /// Vote for delegates
    Vote = 3,
    /// Multisignature group registration
    Multisignature = 4,
}

impl TransactionType {
    /// Parse from the wire tag byte
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(TransactionType::Transfer),
            1 => Some(TransactionType::SecondSignature),
            2 => Some(TransactionType::Delegate),
            3 => Some(TransactionType::Vote),
            4 => Some(TransactionType::Multisignature),
            _ => None,
        }
    }

    /// Wire tag byte
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl From<TransactionType> for u8 {
    fn from(t: TransactionType) -> u8 {
        t.as_u8()
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, String> {
        TransactionType::from_u8(v).ok_or_else(|| format!("unknown transaction type {}", v))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Transfer => "transfer",
            TransactionType::SecondSignature => "second-signature",
            TransactionType::Delegate => "delegate",
            TransactionType::Vote => "vote",
            TransactionType::Multisignature => "multisignature",
        };
        write!(f, "{}", name)
    }
}

/// Type-specific asset payload, shape owned by the registry handler
///
/// Serializes in the peer protocol shape: an object keyed by section name
/// (`signature`, `delegate`, `votes`, `multisignature`) or empty for a
/// transfer. The same shape is what the registry handlers normalize from
/// raw JSON, so typed and raw representations round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    /// Value transfer carries no asset
    Transfer,
    /// New second-factor public key
    SecondSignature {
        /// The second-factor public key being registered
        public_key: PublicKey,
    },
    /// Delegate registration
    Delegate {
        /// Delegate username (lowercase, max 20 chars)
        username: String,
    },
    /// Vote for delegates
    Vote {
        /// Vote entries, each `+<hex pubkey>` or `-<hex pubkey>`
        votes: Vec<String>,
    },
    /// Multisignature group registration
    Multisignature {
        /// Minimum number of co-signatures required
        min: u8,
        /// Pending-signature lifetime in hours
        lifetime: u8,
        /// Member keys, each `+<hex pubkey>`
        keysgroup: Vec<String>,
    },
}

impl Asset {
    /// The transaction type this asset belongs to
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Asset::Transfer => TransactionType::Transfer,
            Asset::SecondSignature { .. } => TransactionType::SecondSignature,
            Asset::Delegate { .. } => TransactionType::Delegate,
            Asset::Vote { .. } => TransactionType::Vote,
            Asset::Multisignature { .. } => TransactionType::Multisignature,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SecondSignatureSection {
    #[serde(rename = "publicKey")]
    public_key: PublicKey,
}

#[derive(Serialize, Deserialize)]
struct DelegateSection {
    username: String,
}

#[derive(Serialize, Deserialize)]
struct MultisignatureSection {
    min: u8,
    lifetime: u8,
    keysgroup: Vec<String>,
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        match self {
            Asset::Transfer => serializer.serialize_map(Some(0))?.end(),
            Asset::SecondSignature { public_key } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "signature",
                    &SecondSignatureSection {
                        public_key: *public_key,
                    },
                )?;
                map.end()
            }
            Asset::Delegate { username } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "delegate",
                    &DelegateSection {
                        username: username.clone(),
                    },
                )?;
                map.end()
            }
            Asset::Vote { votes } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("votes", votes)?;
                map.end()
            }
            Asset::Multisignature {
                min,
                lifetime,
                keysgroup,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "multisignature",
                    &MultisignatureSection {
                        min: *min,
                        lifetime: *lifetime,
                        keysgroup: keysgroup.clone(),
                    },
                )?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AssetVisitor;

        impl<'de> Visitor<'de> for AssetVisitor {
            type Value = Asset;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an asset object keyed by section name")
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Asset, A::Error> {
                let Some(key) = map.next_key::<String>()? else {
                    return Ok(Asset::Transfer);
                };
                let asset = match key.as_str() {
                    "signature" => {
                        let section: SecondSignatureSection = map.next_value()?;
                        Asset::SecondSignature {
                            public_key: section.public_key,
                        }
                    }
                    "delegate" => {
                        let section: DelegateSection = map.next_value()?;
                        Asset::Delegate {
                            username: section.username,
                        }
                    }
                    "votes" => Asset::Vote {
                        votes: map.next_value()?,
                    },
                    "multisignature" => {
                        let section: MultisignatureSection = map.next_value()?;
                        Asset::Multisignature {
                            min: section.min,
                            lifetime: section.lifetime,
                            keysgroup: section.keysgroup,
                        }
                    }
                    other => {
                        return Err(de::Error::unknown_field(
                            other,
                            &["signature", "delegate", "votes", "multisignature"],
                        ))
                    }
                };
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom("asset must carry a single section"));
                }
                Ok(asset)
            }
        }

        deserializer.deserialize_map(AssetVisitor)
    }
}

/// A transaction, immutable once signed
///
/// The `id` field must always equal the value recomputed from the signed byte
/// encoding; a mismatch is a hard validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Type tag selecting the registry handler
    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Seconds since the network epoch
    pub timestamp: u32,

    /// Sender public key
    pub sender_public_key: PublicKey,

    /// Requester public key (multisignature on-behalf-of), optional
    #[serde(default)]
    pub requester_public_key: Option<PublicKey>,

    /// Claimed sender address, verified against the key-derived address
    pub sender_id: Address,

    /// Recipient address, absent for non-transfer types
    #[serde(default)]
    pub recipient_id: Option<Address>,

    /// Amount in atomic units, bounded by total supply
    pub amount: u64,

    /// Fee in atomic units, computed per type, never trusted
    pub fee: u64,

    /// Primary signature
    pub signature: Signature,

    /// Second-factor signature, optional
    #[serde(default)]
    pub sign_signature: Option<Signature>,

    /// Canonical identifier, always recomputed before trust
    pub id: TransactionId,

    /// Type-specific asset payload
    pub asset: Asset,

    /// Block the transaction is confirmed in, if any
    #[serde(default)]
    pub block_id: Option<String>,

    /// Times this transaction has been re-broadcast; never wire-encoded
    #[serde(default)]
    pub relays: u32,
}

impl Transaction {
    /// Total debit the sender must cover: `amount + fee`
    ///
    /// `None` on overflow.
    pub fn total_spend(&self) -> Option<u64> {
        self.amount.checked_add(self.fee)
    }
}

/// In-memory account representation, owned by the external account ledger
///
/// The `u_*` fields mirror their confirmed counterparts for transactions
/// sitting in the local pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account address
    pub address: Address,

    /// Public key, absent until the first outgoing transaction
    pub public_key: Option<PublicKey>,

    /// Registered second-factor public key
    pub second_public_key: Option<PublicKey>,

    /// Whether a second signature is registered (confirmed)
    pub second_signature: bool,

    /// Whether a second signature registration is pending in the pool
    pub u_second_signature: bool,

    /// Confirmed balance (block-applied)
    pub balance: u64,

    /// Unconfirmed balance (tentatively adjusted by pooled transactions)
    pub u_balance: u64,

    /// Whether this account is a registered delegate (confirmed)
    pub is_delegate: bool,

    /// Whether a delegate registration is pending in the pool
    pub u_is_delegate: bool,

    /// Delegate username (confirmed)
    pub username: Option<String>,

    /// Delegate username pending in the pool
    pub u_username: Option<String>,

    /// Multisignature member keys (confirmed)
    pub multisignatures: Vec<PublicKey>,

    /// Multisignature member keys pending in the pool
    pub u_multisignatures: Vec<PublicKey>,

    /// Minimum co-signatures required
    pub multimin: u8,

    /// Multisignature lifetime in hours
    pub multilifetime: u8,
}

impl Account {
    /// New empty account for an address
    pub fn new(address: Address) -> Self {
        Self {
            address,
            public_key: None,
            second_public_key: None,
            second_signature: false,
            u_second_signature: false,
            balance: 0,
            u_balance: 0,
            is_delegate: false,
            u_is_delegate: false,
            username: None,
            u_username: None,
            multisignatures: Vec::new(),
            u_multisignatures: Vec::new(),
            multimin: 0,
            multilifetime: 0,
        }
    }

    /// New account with a known public key and balances
    pub fn with_balance(address: Address, public_key: PublicKey, balance: u64) -> Self {
        let mut account = Self::new(address);
        account.public_key = Some(public_key);
        account.balance = balance;
        account.u_balance = balance;
        account
    }
}

/// Minimal reference to the block a transaction is being applied under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block identifier
    pub id: String,

    /// Block height
    pub height: u64,
}
