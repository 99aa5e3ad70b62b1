//! transfer flow properties against the in-memory cluster

use proptest::prelude::*;
use std::sync::Arc;

use superteach::testing::MockRpc;
use superteach::tx::Transaction;
use superteach::{
    KeypairWallet, Pubkey, StarterConfig, StarterError, TransferExecutor, TransferRequest,
    WalletProvider, LAMPORTS_PER_SOL,
};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(f)
}

fn recipient() -> String {
    Pubkey([9u8; 32]).to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// amounts at or above the balance never reach the network
    #[test]
    fn insufficient_funds_rejected_before_any_mutation(
        balance in 0u64..=1_000 * LAMPORTS_PER_SOL,
        extra in 0u64..=10 * LAMPORTS_PER_SOL,
    ) {
        let amount = balance.saturating_add(extra).max(1);
        block_on(async {
            let wallet = Arc::new(KeypairWallet::from_seed([1u8; 32]));
            wallet.connect().await.unwrap();
            let sender = wallet.pubkey();
            let rpc = Arc::new(MockRpc::new().with_balance(sender, balance).confirming_at(1));
            let exec = TransferExecutor::new(rpc.clone(), wallet, &StarterConfig::devnet());

            let request = TransferRequest { sender, recipient: Pubkey([9u8; 32]), amount_lamports: amount };
            let result = exec.execute(&request).await;

            prop_assert_eq!(
                result,
                Err(StarterError::InsufficientFunds { balance, requested: amount })
            );
            prop_assert_eq!(rpc.blockhash_calls(), 0);
            prop_assert!(rpc.submitted().is_empty());
            Ok(())
        })?;
    }

    /// whole and fractional SOL amounts arrive as exact lamports
    #[test]
    fn submitted_lamports_are_exact(whole in 0u64..1_000, frac in 0u64..LAMPORTS_PER_SOL) {
        prop_assume!(whole > 0 || frac > 0);
        let amount_text = format!("{}.{:09}", whole, frac);
        let expected = whole * LAMPORTS_PER_SOL + frac;

        block_on(async {
            let wallet = Arc::new(KeypairWallet::from_seed([2u8; 32]));
            wallet.connect().await.unwrap();
            let sender = wallet.pubkey();
            let rpc = Arc::new(
                MockRpc::new()
                    .with_balance(sender, 2_000 * LAMPORTS_PER_SOL)
                    .confirming_at(10),
            );
            let exec = TransferExecutor::new(rpc.clone(), wallet, &StarterConfig::devnet());

            let request = TransferRequest::from_form(Some(sender), &recipient(), &amount_text).unwrap();
            prop_assert_eq!(request.amount_lamports, expected);
            exec.execute(&request).await.unwrap();

            let submitted = rpc.submitted();
            prop_assert_eq!(submitted.len(), 1);
            let tx = Transaction::deserialize(&submitted[0]).unwrap();
            prop_assert_eq!(tx.message.transfer_lamports(), Some(expected));
            Ok(())
        })?;
    }
}

#[test]
fn whole_unit_amount() {
    let sender = Pubkey([1u8; 32]);
    for sol in [1u64, 2, 17, 999] {
        let request = TransferRequest::from_form(Some(sender), &recipient(), &sol.to_string()).unwrap();
        assert_eq!(request.amount_lamports, sol * LAMPORTS_PER_SOL);
    }
}
