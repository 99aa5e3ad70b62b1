//! legacy transaction wire format
//!
//! ```text
//! Transaction
//! ├── signatures: shortvec<[u8; 64]>   (one per required signer, payer first)
//! └── Message
//!     ├── header: [num_required_signatures, num_readonly_signed, num_readonly_unsigned]
//!     ├── account_keys: shortvec<[u8; 32]>
//!     ├── recent_blockhash: [u8; 32]
//!     └── instructions: shortvec<{ program_id_index: u8, accounts: shortvec<u8>, data: shortvec<u8> }>
//! ```
//!
//! shortvec is the compact-u16 length prefix: 7 bits per byte, high bit = continue.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

use crate::pubkey::{Blockhash, Pubkey, Signature, SYSTEM_PROGRAM_ID};

/// system program instruction tag for `Transfer`
const SYSTEM_TRANSFER_TAG: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("unexpected end of input at byte {0}")]
    Truncated(usize),
    #[error("shortvec length overflows u16")]
    ShortVecOverflow,
    #[error("too many accounts: {0}")]
    TooManyAccounts(usize),
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
    #[error("signer {0} is not a required signer of this message")]
    NotASigner(Pubkey),
    #[error("signature count {got} does not match header ({expected})")]
    SignatureCount { expected: usize, got: usize },
    #[error("invalid signature for {0}")]
    InvalidSignature(Pubkey),
    #[error("invalid public key bytes for {0}")]
    InvalidPublicKey(Pubkey),
}

pub type Result<T> = std::result::Result<T, TxError>;

/// account reference inside an instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// native transfer from `from` to `to`
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    }
}

/// decode a system transfer instruction's lamports, if it is one
pub fn decode_system_transfer(program_id: &Pubkey, data: &[u8]) -> Option<u64> {
    if *program_id != SYSTEM_PROGRAM_ID || data.len() != 12 {
        return None;
    }
    let tag = u32::from_le_bytes(data[0..4].try_into().ok()?);
    if tag != SYSTEM_TRANSFER_TAG {
        return None;
    }
    Some(u64::from_le_bytes(data[4..12].try_into().ok()?))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// compile instructions with `payer` as the first (fee paying) signer
    pub fn new(instructions: &[Instruction], payer: &Pubkey, recent_blockhash: Blockhash) -> Result<Self> {
        // first-seen order, flags merged
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];
        let mut merge = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(meta.clone());
            }
            merge(AccountMeta::readonly(ix.program_id, false));
        }

        if metas.len() > u8::MAX as usize {
            return Err(TxError::TooManyAccounts(metas.len()));
        }

        let mut account_keys = keys_where(&metas, true, true);
        let readonly_signed = keys_where(&metas, true, false);
        let writable_unsigned = keys_where(&metas, false, true);
        let readonly_unsigned = keys_where(&metas, false, false);

        let header = MessageHeader {
            num_required_signatures: (account_keys.len() + readonly_signed.len()) as u8,
            num_readonly_signed_accounts: readonly_signed.len() as u8,
            num_readonly_unsigned_accounts: readonly_unsigned.len() as u8,
        };
        account_keys.extend(readonly_signed);
        account_keys.extend(writable_unsigned);
        account_keys.extend(readonly_unsigned);

        let index_of = |key: &Pubkey| {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or(TxError::TooManyAccounts(account_keys.len()))
        };

        let instructions = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<Result<Vec<u8>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// keys that must sign, in signature order
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// bytes covered by every signature
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + 1 + self.account_keys.len() * 32 + 32 + 64);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_len(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_len(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            encode_len(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let header = MessageHeader {
            num_required_signatures: reader.byte()?,
            num_readonly_signed_accounts: reader.byte()?,
            num_readonly_unsigned_accounts: reader.byte()?,
        };

        let key_count = reader.len()?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            account_keys.push(Pubkey(reader.array::<32>()?));
        }
        let recent_blockhash = Blockhash(reader.array::<32>()?);

        let ix_count = reader.len()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.byte()?;
            let n = reader.len()?;
            let accounts = reader.bytes(n)?.to_vec();
            let n = reader.len()?;
            let data = reader.bytes(n)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    /// lamports moved by the first system transfer in the message
    pub fn transfer_lamports(&self) -> Option<u64> {
        self.instructions.iter().find_map(|ix| {
            let program = self.account_keys.get(ix.program_id_index as usize)?;
            decode_system_transfer(program, &ix.data)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// empty signature slots, one per required signer
    pub fn new_unsigned(message: Message) -> Self {
        let n = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![Signature::default(); n],
            message,
        }
    }

    /// single transfer paid by `from`
    pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64, recent_blockhash: Blockhash) -> Result<Self> {
        let ix = system_transfer(from, to, lamports);
        Ok(Self::new_unsigned(Message::new(&[ix], from, recent_blockhash)?))
    }

    pub fn message_data(&self) -> Vec<u8> {
        self.message.serialize()
    }

    /// fill the slot belonging to `key`
    pub fn sign(&mut self, key: &SigningKey) -> Result<()> {
        let pubkey = Pubkey::from(key.verifying_key());
        let position = self
            .message
            .signer_keys()
            .iter()
            .position(|k| *k == pubkey)
            .ok_or(TxError::NotASigner(pubkey))?;
        let signature = key.sign(&self.message_data());
        self.signatures[position] = Signature::from(signature);
        Ok(())
    }

    /// place a signature produced elsewhere (e.g. a browser wallet)
    pub fn add_signature(&mut self, signer: &Pubkey, signature: Signature) -> Result<()> {
        let position = self
            .message
            .signer_keys()
            .iter()
            .position(|k| k == signer)
            .ok_or(TxError::NotASigner(*signer))?;
        self.signatures[position] = signature;
        Ok(())
    }

    /// the transaction id: the fee payer's signature
    pub fn id(&self) -> Option<Signature> {
        self.signatures.first().copied().filter(|s| !s.is_empty())
    }

    /// check every required signature against the message
    pub fn verify(&self) -> Result<()> {
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return Err(TxError::SignatureCount {
                expected: signers.len(),
                got: self.signatures.len(),
            });
        }
        let data = self.message_data();
        for (key, sig) in signers.iter().zip(&self.signatures) {
            let vk = VerifyingKey::from_bytes(key.as_bytes())
                .map_err(|_| TxError::InvalidPublicKey(*key))?;
            let sig = ed25519_dalek::Signature::from_bytes(sig.as_bytes());
            vk.verify(&data, &sig)
                .map_err(|_| TxError::InvalidSignature(*key))?;
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + message.len());
        encode_len(&mut out, self.signatures.len());
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&message);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let sig_count = reader.len()?;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            signatures.push(Signature(reader.array::<64>()?));
        }
        let message = Message::decode(&mut reader)?;
        if reader.remaining() > 0 {
            return Err(TxError::TrailingBytes(reader.remaining()));
        }
        Ok(Self { signatures, message })
    }
}

fn keys_where(metas: &[AccountMeta], signer: bool, writable: bool) -> Vec<Pubkey> {
    metas
        .iter()
        .filter(|m| m.is_signer == signer && m.is_writable == writable)
        .map(|m| m.pubkey)
        .collect()
}

/// compact-u16 length prefix
pub fn encode_len(out: &mut Vec<u8>, len: usize) {
    let mut rem = len as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or(TxError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(TxError::Truncated(self.data.len()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn len(&mut self) -> Result<usize> {
        let mut value: u32 = 0;
        for shift in [0u32, 7, 14] {
            let b = self.byte()?;
            value |= ((b & 0x7f) as u32) << shift;
            if b & 0x80 == 0 {
                return u16::try_from(value)
                    .map(usize::from)
                    .map_err(|_| TxError::ShortVecOverflow);
            }
        }
        Err(TxError::ShortVecOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn test_shortvec_encoding() {
        let enc = |n| {
            let mut v = Vec::new();
            encode_len(&mut v, n);
            v
        };
        assert_eq!(enc(0), vec![0x00]);
        assert_eq!(enc(127), vec![0x7f]);
        assert_eq!(enc(128), vec![0x80, 0x01]);
        assert_eq!(enc(16384), vec![0x80, 0x80, 0x01]);
        assert_eq!(enc(0xffff), vec![0xff, 0xff, 0x03]);

        let mut r = Reader::new(&[0x80, 0x80, 0x01]);
        assert_eq!(r.len().unwrap(), 16384);
        let mut r = Reader::new(&[0xff, 0xff, 0x07]);
        assert_eq!(r.len(), Err(TxError::ShortVecOverflow));
    }

    #[test]
    fn test_transfer_instruction_data() {
        let from = Pubkey([1u8; 32]);
        let to = Pubkey([2u8; 32]);
        let ix = system_transfer(&from, &to, 1_500_000_000);
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(decode_system_transfer(&ix.program_id, &ix.data), Some(1_500_000_000));
    }

    #[test]
    fn test_transfer_message_layout() {
        let from = Pubkey::from(key(1).verifying_key());
        let to = Pubkey([9u8; 32]);
        let tx = Transaction::transfer(&from, &to, 42, Blockhash([3u8; 32])).unwrap();
        let msg = &tx.message;

        assert_eq!(
            msg.header,
            MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            }
        );
        assert_eq!(msg.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(msg.instructions[0].program_id_index, 2);
        assert_eq!(msg.instructions[0].accounts, vec![0, 1]);
        assert_eq!(msg.fee_payer(), Some(&from));
        assert_eq!(msg.transfer_lamports(), Some(42));

        // 3 header + 1 + 3*32 keys + 32 blockhash + 1 + (1 + 1 + 2 + 1 + 12) instruction
        assert_eq!(msg.serialize().len(), 3 + 1 + 96 + 32 + 1 + 17);
        assert_eq!(tx.signatures, vec![Signature::default()]);
        assert!(tx.id().is_none());
    }

    #[test]
    fn test_self_transfer_merges_accounts() {
        let from = Pubkey([5u8; 32]);
        let tx = Transaction::transfer(&from, &from, 1, Blockhash::default()).unwrap();
        assert_eq!(tx.message.account_keys, vec![from, SYSTEM_PROGRAM_ID]);
        assert_eq!(tx.message.instructions[0].accounts, vec![0, 0]);
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = key(4);
        let from = Pubkey::from(signer.verifying_key());
        let mut tx = Transaction::transfer(&from, &Pubkey([8u8; 32]), 7, Blockhash([1u8; 32])).unwrap();

        assert!(matches!(tx.verify(), Err(TxError::InvalidSignature(_))));
        tx.sign(&signer).unwrap();
        tx.verify().unwrap();
        assert!(tx.id().is_some());

        // tampering with the amount breaks the signature
        let mut tampered = tx.clone();
        tampered.message.instructions[0].data[4] ^= 1;
        assert!(tampered.verify().is_err());
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let from = Pubkey::from(key(1).verifying_key());
        let mut tx = Transaction::transfer(&from, &Pubkey([8u8; 32]), 7, Blockhash::default()).unwrap();
        assert!(matches!(tx.sign(&key(2)), Err(TxError::NotASigner(_))));
    }

    #[test]
    fn test_detached_signature() {
        let signer = key(4);
        let from = Pubkey::from(signer.verifying_key());
        let mut tx = Transaction::transfer(&from, &Pubkey([8u8; 32]), 7, Blockhash([3u8; 32])).unwrap();

        let detached = Signature::from(signer.sign(&tx.message_data()));
        tx.add_signature(&from, detached).unwrap();
        tx.verify().unwrap();
        assert_eq!(tx.id(), Some(detached));

        assert!(matches!(
            tx.add_signature(&Pubkey([8u8; 32]), detached),
            Err(TxError::NotASigner(_))
        ));
    }

    #[test]
    fn test_wire_decode() {
        let signer = key(6);
        let from = Pubkey::from(signer.verifying_key());
        let mut tx = Transaction::transfer(&from, &Pubkey([8u8; 32]), 99, Blockhash([2u8; 32])).unwrap();
        tx.sign(&signer).unwrap();

        let bytes = tx.serialize();
        assert_eq!(bytes[0], 1);
        assert_eq!(Transaction::deserialize(&bytes).unwrap(), tx);

        assert!(matches!(
            Transaction::deserialize(&bytes[..bytes.len() - 1]),
            Err(TxError::Truncated(_))
        ));
        let mut extra = bytes.clone();
        extra.push(0);
        assert_eq!(Transaction::deserialize(&extra), Err(TxError::TrailingBytes(1)));
    }
}
