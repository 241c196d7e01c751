//! Solana Wire Format
//!
//! Client-side construction of the small set of transactions the gateway
//! issues: SPL `TransferChecked` for token delivery and system-program
//! transfers for sell payouts. Implements the legacy message wire format
//! (compact-u16 arrays, header, account keys, recent blockhash, compiled
//! instructions), associated-token-account derivation, and Ed25519
//! signing directly, without a chain SDK.

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// System program (all zeros).
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey([0u8; 32]);

/// SPL Token program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`.
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// Associated Token Account program:
/// `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// SPL Token `TransferChecked` instruction discriminant.
const TRANSFER_CHECKED_IX: u8 = 12;

/// System program `Transfer` instruction discriminant (u32 LE).
const SYSTEM_TRANSFER_IX: u32 = 2;

/// Error while building or encoding a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Invalid base58 public key: {0}")]
    InvalidBase58(String),

    #[error("Public key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("No viable bump seed for program-derived address")]
    NoViableBump,

    #[error("Too many distinct accounts in transaction")]
    TooManyAccounts,
}

/// A 32-byte Ed25519 public key / account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    /// Parse from base58 text.
    pub fn from_base58(s: &str) -> Result<Self, WireError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| WireError::InvalidBase58(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| WireError::InvalidKeyLength(bytes.len()))?;
        Ok(Pubkey(arr))
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Whether the bytes decompress to a point on the Ed25519 curve.
    /// Program-derived addresses must be off-curve.
    fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl std::str::FromStr for Pubkey {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_base58(s)
    }
}

/// The gateway's signing wallet.
pub struct IcoWallet {
    signing_key: SigningKey,
    pubkey: Pubkey,
}

impl IcoWallet {
    /// Derive the wallet keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let pubkey = Pubkey(signing_key.verifying_key().to_bytes());
        Self { signing_key, pubkey }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    /// Sign a serialized message.
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for IcoWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material.
        f.debug_struct("IcoWallet").field("pubkey", &self.pubkey).finish()
    }
}

/// Account reference within an instruction.
#[derive(Debug, Clone, Copy)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single instruction before message compilation.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// SPL Token `TransferChecked`: move `amount` base units of `mint` from
/// `source` to `destination`, authorized by `owner`.
pub fn transfer_checked(
    source: Pubkey,
    mint: Pubkey,
    destination: Pubkey,
    owner: Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = Vec::with_capacity(10);
    data.push(TRANSFER_CHECKED_IX);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(source, false),
            AccountMeta::readonly(mint, false),
            AccountMeta::writable(destination, false),
            AccountMeta::readonly(owner, true),
        ],
        data,
    }
}

/// System-program lamport transfer from `from` to `to`.
pub fn system_transfer(from: Pubkey, to: Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_IX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(from, true),
            AccountMeta::writable(to, false),
        ],
        data,
    }
}

/// Derive the associated token account for `(owner, mint)`.
pub fn derive_associated_token_account(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, WireError> {
    let seeds: [&[u8]; 3] = [&owner.0, &TOKEN_PROGRAM_ID.0, &mint.0];
    find_program_address(&seeds, &ASSOCIATED_TOKEN_PROGRAM_ID).map(|(address, _bump)| address)
}

/// Find the first off-curve address for the given seeds, searching bump
/// seeds from 255 downward.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), WireError> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.0);
        hasher.update(PDA_MARKER);
        let candidate = Pubkey(hasher.finalize().into());
        if !candidate.is_on_curve() {
            return Ok((candidate, bump));
        }
    }
    Err(WireError::NoViableBump)
}

/// Serialize a legacy message for the given instructions.
///
/// The payer is placed first in the account list and is the transaction's
/// sole fee payer; remaining accounts are ordered writable-signers,
/// readonly-signers, writable non-signers, readonly non-signers, with
/// program ids as readonly non-signers.
pub fn compile_message(
    instructions: &[Instruction],
    payer: &Pubkey,
    recent_blockhash: &[u8; 32],
) -> Result<Vec<u8>, WireError> {
    #[derive(Clone, Copy, Default)]
    struct Flags {
        is_signer: bool,
        is_writable: bool,
    }

    // Merge account flags across instructions; payer is always first.
    let mut order: Vec<Pubkey> = vec![*payer];
    let mut flags: Vec<Flags> = vec![Flags {
        is_signer: true,
        is_writable: true,
    }];
    let upsert = |order: &mut Vec<Pubkey>, flags: &mut Vec<Flags>, key: Pubkey, f: Flags| {
        match order.iter().position(|k| *k == key) {
            Some(i) => {
                flags[i].is_signer |= f.is_signer;
                flags[i].is_writable |= f.is_writable;
            }
            None => {
                order.push(key);
                flags.push(f);
            }
        }
    };

    for instruction in instructions {
        for account in &instruction.accounts {
            upsert(
                &mut order,
                &mut flags,
                account.pubkey,
                Flags {
                    is_signer: account.is_signer,
                    is_writable: account.is_writable,
                },
            );
        }
        upsert(
            &mut order,
            &mut flags,
            instruction.program_id,
            Flags::default(),
        );
    }

    // Class order: writable signers (payer leads), readonly signers,
    // writable non-signers, readonly non-signers.
    let class = |f: &Flags| match (f.is_signer, f.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    };
    let mut indexed: Vec<(Pubkey, Flags)> = order.into_iter().zip(flags).collect();
    let payer_key = *payer;
    indexed.sort_by_key(|(key, f)| (class(f), if *key == payer_key { 0u8 } else { 1 }));

    if indexed.len() > u8::MAX as usize {
        return Err(WireError::TooManyAccounts);
    }

    let num_signers = indexed.iter().filter(|(_, f)| f.is_signer).count() as u8;
    let num_readonly_signed = indexed
        .iter()
        .filter(|(_, f)| f.is_signer && !f.is_writable)
        .count() as u8;
    let num_readonly_unsigned = indexed
        .iter()
        .filter(|(_, f)| !f.is_signer && !f.is_writable)
        .count() as u8;

    let index_of = |key: &Pubkey| -> u8 {
        indexed
            .iter()
            .position(|(k, _)| k == key)
            .expect("key was inserted above") as u8
    };

    let mut message = Vec::new();
    message.push(num_signers);
    message.push(num_readonly_signed);
    message.push(num_readonly_unsigned);

    encode_compact_u16(&mut message, indexed.len() as u16);
    for (key, _) in &indexed {
        message.extend_from_slice(&key.0);
    }

    message.extend_from_slice(recent_blockhash);

    encode_compact_u16(&mut message, instructions.len() as u16);
    for instruction in instructions {
        message.push(index_of(&instruction.program_id));
        encode_compact_u16(&mut message, instruction.accounts.len() as u16);
        for account in &instruction.accounts {
            message.push(index_of(&account.pubkey));
        }
        encode_compact_u16(&mut message, instruction.data.len() as u16);
        message.extend_from_slice(&instruction.data);
    }

    Ok(message)
}

/// Wrap a compiled message and its single signature into a transaction.
pub fn sign_transaction(message: &[u8], wallet: &IcoWallet) -> Vec<u8> {
    let signature = wallet.sign_message(message);
    let mut tx = Vec::with_capacity(1 + 64 + message.len());
    encode_compact_u16(&mut tx, 1);
    tx.extend_from_slice(&signature);
    tx.extend_from_slice(message);
    tx
}

/// Solana's compact-u16 ("shortvec") length encoding.
fn encode_compact_u16(out: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_base58_round_trip() {
        let key = Pubkey([7u8; 32]);
        let text = key.to_base58();
        assert_eq!(Pubkey::from_base58(&text).unwrap(), key);

        assert_eq!(
            TOKEN_PROGRAM_ID.to_base58(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
        assert_eq!(
            ASSOCIATED_TOKEN_PROGRAM_ID.to_base58(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
        assert_eq!(
            SYSTEM_PROGRAM_ID.to_base58(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn test_pubkey_rejects_bad_input() {
        assert!(matches!(
            Pubkey::from_base58("not base58 0OIl"),
            Err(WireError::InvalidBase58(_))
        ));
        assert!(matches!(
            Pubkey::from_base58("abc"),
            Err(WireError::InvalidKeyLength(_))
        ));
    }

    #[test]
    fn test_derive_associated_token_account_golden() {
        // Independently computed with a reference PDA implementation.
        let owner = Pubkey([1u8; 32]);
        let mint = Pubkey([2u8; 32]);
        let ata = derive_associated_token_account(&owner, &mint).unwrap();
        assert_eq!(
            ata.to_base58(),
            "CsYkfSfTUTWwnoeRkGchtai5kkYz2SC33kKJwA99wVr3"
        );
    }

    #[test]
    fn test_derived_address_is_off_curve() {
        let owner = Pubkey([9u8; 32]);
        let mint = Pubkey([4u8; 32]);
        let ata = derive_associated_token_account(&owner, &mint).unwrap();
        assert!(!ata.is_on_curve());
    }

    #[test]
    fn test_wallet_pubkey_is_on_curve() {
        let wallet = IcoWallet::from_seed([1u8; 32]);
        assert!(wallet.pubkey().is_on_curve());
    }

    #[test]
    fn test_transfer_checked_data_layout() {
        let ix = transfer_checked(
            Pubkey([1; 32]),
            Pubkey([2; 32]),
            Pubkey([3; 32]),
            Pubkey([4; 32]),
            1_000_000_000,
            9,
        );
        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(ix.data.len(), 10);
        assert_eq!(ix.data[0], 12);
        assert_eq!(u64::from_le_bytes(ix.data[1..9].try_into().unwrap()), 1_000_000_000);
        assert_eq!(ix.data[9], 9);
        assert!(ix.accounts[3].is_signer);
    }

    #[test]
    fn test_system_transfer_data_layout() {
        let ix = system_transfer(Pubkey([1; 32]), Pubkey([2; 32]), 42);
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.data.len(), 12);
        assert_eq!(u32::from_le_bytes(ix.data[0..4].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(ix.data[4..12].try_into().unwrap()), 42);
    }

    #[test]
    fn test_compile_message_layout() {
        let wallet = IcoWallet::from_seed([3u8; 32]);
        let payer = wallet.pubkey();
        let recipient = Pubkey([2u8; 32]);
        let blockhash = [9u8; 32];

        let ix = system_transfer(payer, recipient, 42);
        let message = compile_message(&[ix], &payer, &blockhash).unwrap();

        // Header: 1 signer, 0 readonly signed, 1 readonly unsigned (the
        // system program).
        assert_eq!(&message[0..3], &[1, 0, 1]);
        // Three accounts: payer, recipient, system program.
        assert_eq!(message[3], 3);
        assert_eq!(&message[4..36], &payer.0);
        assert_eq!(&message[36..68], &recipient.0);
        assert_eq!(&message[68..100], &SYSTEM_PROGRAM_ID.0);
        assert_eq!(&message[100..132], &blockhash);
        // One instruction: program index 2, accounts [0, 1], 12 data bytes.
        assert_eq!(&message[132..], &[1, 2, 2, 0, 1, 12, 2, 0, 0, 0, 42, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_sign_transaction_shape() {
        let wallet = IcoWallet::from_seed([5u8; 32]);
        let payer = wallet.pubkey();
        let ix = system_transfer(payer, Pubkey([8u8; 32]), 7);
        let message = compile_message(&[ix], &payer, &[0u8; 32]).unwrap();

        let tx = sign_transaction(&message, &wallet);
        assert_eq!(tx[0], 1);
        assert_eq!(tx.len(), 1 + 64 + message.len());
        assert_eq!(&tx[65..], &message[..]);

        // Signing is deterministic.
        let again = sign_transaction(&message, &wallet);
        assert_eq!(tx, again);
    }

    #[test]
    fn test_compact_u16_encoding() {
        let mut buf = Vec::new();
        encode_compact_u16(&mut buf, 0);
        encode_compact_u16(&mut buf, 5);
        encode_compact_u16(&mut buf, 0x7f);
        encode_compact_u16(&mut buf, 0x80);
        encode_compact_u16(&mut buf, 0x3fff);
        encode_compact_u16(&mut buf, 0x4000);
        assert_eq!(
            buf,
            vec![0, 5, 0x7f, 0x80, 0x01, 0xff, 0x7f, 0x80, 0x80, 0x01]
        );
    }
}
