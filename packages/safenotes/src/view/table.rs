use std::collections::HashSet;

use crate::identity::identity::create_safe_chain_unique_id;
use crate::models::model::{Safe, SelectedSafe, Transfer, TransferTableItem, ViewType};

/// Transfers below this many display units are dust/spam and hidden from
/// views. Storage is unaffected.
pub const DISPLAY_THRESHOLD: f64 = 0.99;

pub(crate) fn decimal_adjusted_value(transfer: &Transfer) -> f64 {
    let decimals = transfer.token_decimals.unwrap_or(18);
    let value: f64 = transfer
        .value
        .as_deref()
        .unwrap_or("0")
        .parse()
        .unwrap_or(0.0);

    value / 10f64.powi(decimals)
}

/// Projects stored transfers into direction-tagged display rows for the
/// given perspective: a specific safe+chain, or every safe of the
/// organization. A transfer between two tracked safes yields both an `out`
/// and an `in` row.
pub fn transfers_to_table_rows(
    transfers: &[Transfer],
    selected_safe: Option<&SelectedSafe>,
    all_safes: &[Safe],
) -> Vec<TransferTableItem> {
    let tracked: HashSet<String> = match selected_safe {
        Some(selected) => {
            let mut set = HashSet::new();
            set.insert(create_safe_chain_unique_id(&selected.address, selected.chain));
            set
        }
        None => all_safes
            .iter()
            .map(|safe| create_safe_chain_unique_id(&safe.address, safe.chain))
            .collect(),
    };

    transfers
        .iter()
        .filter(|transfer| decimal_adjusted_value(transfer) >= DISPLAY_THRESHOLD)
        .flat_map(|transfer| {
            let mut rows = Vec::new();

            let identifier_out =
                create_safe_chain_unique_id(&transfer.from_address, transfer.safe_chain);
            let identifier_in =
                create_safe_chain_unique_id(&transfer.to_address, transfer.safe_chain);

            if tracked.contains(&identifier_out) {
                rows.push(TransferTableItem {
                    transfer: transfer.clone(),
                    view_type: ViewType::Out,
                });
            }

            if tracked.contains(&identifier_in) {
                rows.push(TransferTableItem {
                    transfer: transfer.clone(),
                    view_type: ViewType::In,
                });
            }

            rows
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::model::{Chain, TransferType};

    const SAFE_A: &str = "0xAAA0000000000000000000000000000000000001";
    const SAFE_B: &str = "0xBBB0000000000000000000000000000000000002";
    const OUTSIDER: &str = "0xCCC0000000000000000000000000000000000003";

    fn tracked_safe(address: &str, chain: Chain, organization_id: Uuid) -> Safe {
        Safe {
            address: address.to_string(),
            chain,
            organization_id,
            removed: false,
            removed_at: None,
            created_at: Utc::now(),
        }
    }

    fn transfer(from: &str, to: &str, value: &str, decimals: Option<i32>) -> Transfer {
        Transfer {
            transfer_id: format!("t_{}_{}", from, to),
            safe_address: from.to_string(),
            safe_chain: Chain::ETH,
            transfer_type: TransferType::EtherTransfer,
            execution_date: Utc::now(),
            block_number: 19_000_000,
            transaction_hash: "0xtx".to_string(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            value: Some(value.to_string()),
            token_address: None,
            token_name: None,
            token_symbol: None,
            token_decimals: decimals,
            token_logo_uri: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn dust_below_the_threshold_is_dropped() {
        let org = Uuid::new_v4();
        let safes = vec![tracked_safe(SAFE_A, Chain::ETH, org)];

        // 0.98 units with 18 decimals: excluded.
        let dust = transfer(SAFE_A, OUTSIDER, "980000000000000000", None);
        assert!(transfers_to_table_rows(&[dust], None, &safes).is_empty());

        // 0.99 units exactly: included.
        let visible = transfer(SAFE_A, OUTSIDER, "990000000000000000", None);
        assert_eq!(transfers_to_table_rows(&[visible], None, &safes).len(), 1);
    }

    #[test]
    fn threshold_respects_token_decimals() {
        let org = Uuid::new_v4();
        let safes = vec![tracked_safe(SAFE_A, Chain::ETH, org)];

        let dust = transfer(SAFE_A, OUTSIDER, "980000", Some(6));
        assert!(transfers_to_table_rows(&[dust], None, &safes).is_empty());

        let visible = transfer(SAFE_A, OUTSIDER, "990000", Some(6));
        assert_eq!(transfers_to_table_rows(&[visible], None, &safes).len(), 1);
    }

    #[test]
    fn transfer_between_two_tracked_safes_yields_both_rows() {
        let org = Uuid::new_v4();
        let safes = vec![
            tracked_safe(SAFE_A, Chain::ETH, org),
            tracked_safe(SAFE_B, Chain::ETH, org),
        ];

        let rows = transfers_to_table_rows(
            &[transfer(SAFE_A, SAFE_B, "5000000000000000000", None)],
            None,
            &safes,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].view_type, ViewType::Out);
        assert_eq!(rows[1].view_type, ViewType::In);
    }

    #[test]
    fn membership_is_case_insensitive() {
        let org = Uuid::new_v4();
        let safes = vec![tracked_safe(&SAFE_A.to_lowercase(), Chain::ETH, org)];

        let rows = transfers_to_table_rows(
            &[transfer(SAFE_A, OUTSIDER, "1000000000000000000", None)],
            None,
            &safes,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].view_type, ViewType::Out);
    }

    #[test]
    fn membership_is_chain_scoped() {
        let org = Uuid::new_v4();
        // The same address is only tracked on ARB; an ETH transfer touching
        // it must not match.
        let safes = vec![tracked_safe(SAFE_A, Chain::ARB, org)];

        let rows = transfers_to_table_rows(
            &[transfer(SAFE_A, OUTSIDER, "1000000000000000000", None)],
            None,
            &safes,
        );

        assert!(rows.is_empty());
    }

    #[test]
    fn selected_safe_narrows_the_tracked_set() {
        let org = Uuid::new_v4();
        let safes = vec![
            tracked_safe(SAFE_A, Chain::ETH, org),
            tracked_safe(SAFE_B, Chain::ETH, org),
        ];
        let selected = SelectedSafe {
            address: SAFE_B.to_string(),
            chain: Chain::ETH,
        };

        let rows = transfers_to_table_rows(
            &[transfer(SAFE_A, SAFE_B, "5000000000000000000", None)],
            Some(&selected),
            &safes,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].view_type, ViewType::In);
    }
}
