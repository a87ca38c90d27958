//! Edge case tests for batch replay of marketplace actions.

use bookmarket::{BatchProcessor, BookStatus, TxType};
use std::io::Cursor;

const HEADER: &str = "action,user,book,amount,fee,days\n";

fn run(rows: &str) -> BatchProcessor {
    let mut batch = BatchProcessor::default();
    batch
        .process_csv(Cursor::new(format!("{}{}", HEADER, rows)))
        .unwrap();
    batch
}

fn output(batch: &BatchProcessor) -> String {
    let mut out = Vec::new();
    batch.write_output(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn wallet_line(output: &str, user: &str) -> Option<String> {
    output
        .lines()
        .skip(1) // Skip header
        .find(|line| line.starts_with(&format!("{},", user)))
        .map(|s| s.to_string())
}

/// (balance, spent, earned, purchases, rentals)
fn parse_wallet(line: &str) -> (String, String, String, usize, usize) {
    let parts: Vec<&str> = line.split(',').collect();
    (
        parts[1].to_string(),
        parts[2].to_string(),
        parts[3].to_string(),
        parts[4].parse().unwrap(),
        parts[5].parse().unwrap(),
    )
}

fn balance(batch: &BatchProcessor, user: &str) -> String {
    let out = output(batch);
    let line = wallet_line(&out, user).unwrap();
    parse_wallet(&line).0
}

// ==================== DEPOSIT EDGE CASES ====================

#[test]
fn test_deposit_at_limits() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,1,,\n\
                     deposit,alice,,1000,,\n");
    assert_eq!(balance(&batch, "alice"), "1001.00");
}

#[test]
fn test_deposit_outside_limits_ignored() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,0.99,,\n\
                     deposit,alice,,1000.01,,\n\
                     deposit,alice,,0,,\n\
                     deposit,alice,,-5,,\n");
    assert_eq!(balance(&batch, "alice"), "0.00");
}

#[test]
fn test_deposit_for_unknown_user_ignored() {
    let batch = run("register,alice,,,,\n\
                     deposit,zed,,10,,\n");
    let out = output(&batch);
    assert!(wallet_line(&out, "zed").is_none());
    assert_eq!(balance(&batch, "alice"), "0.00");
}

#[test]
fn test_deposit_with_cents() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,10.05,,\n\
                     deposit,alice,,2.10,,\n");
    assert_eq!(balance(&batch, "alice"), "12.15");
}

// ==================== PURCHASE EDGE CASES ====================

#[test]
fn test_purchase_with_exact_balance() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,alice,,25,,\n\
                     list,bob,b1,25,1,\n\
                     purchase,alice,b1,,,\n");
    let out = output(&batch);
    let (bal, spent, _, purchases, _) = parse_wallet(&wallet_line(&out, "alice").unwrap());
    assert_eq!(bal, "0.00");
    assert_eq!(spent, "25.00");
    assert_eq!(purchases, 1);
}

#[test]
fn test_purchase_short_by_one_cent() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,alice,,24.99,,\n\
                     list,bob,b1,25,1,\n\
                     purchase,alice,b1,,,\n");
    assert_eq!(balance(&batch, "alice"), "24.99");
    assert_eq!(balance(&batch, "bob"), "0.00");
    assert!(batch.engine().store().transactions().is_empty());

    let book = batch.book_id("b1").unwrap();
    assert_eq!(batch.engine().quote(book).unwrap().status, BookStatus::Available);
}

#[test]
fn test_sold_book_cannot_be_bought_twice() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     register,carol,,,,\n\
                     deposit,alice,,100,,\n\
                     deposit,carol,,100,,\n\
                     list,bob,b1,30,1,\n\
                     purchase,alice,b1,,,\n\
                     purchase,carol,b1,,,\n\
                     rent,carol,b1,,,1\n");
    assert_eq!(balance(&batch, "carol"), "100.00");
    assert_eq!(balance(&batch, "bob"), "30.00");
    assert_eq!(batch.engine().store().transactions().len(), 1);
}

#[test]
fn test_buyer_cannot_buy_back_own_book() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,alice,,100,,\n\
                     list,bob,b1,30,1,\n\
                     purchase,alice,b1,,,\n\
                     purchase,alice,b1,,,\n");
    assert_eq!(balance(&batch, "alice"), "70.00");
}

#[test]
fn test_seller_cannot_buy_own_listing() {
    let batch = run("register,bob,,,,\n\
                     deposit,bob,,100,,\n\
                     list,bob,b1,30,1,\n\
                     purchase,bob,b1,,,\n\
                     rent,bob,b1,,,7\n");
    assert_eq!(balance(&batch, "bob"), "100.00");
    assert!(batch.engine().store().transactions().is_empty());
}

#[test]
fn test_free_book_transfers_ownership() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     list,bob,b1,0,0,\n\
                     purchase,alice,b1,,,\n");
    let out = output(&batch);
    let (bal, spent, _, purchases, _) = parse_wallet(&wallet_line(&out, "alice").unwrap());
    assert_eq!(bal, "0.00");
    assert_eq!(spent, "0.00");
    assert_eq!(purchases, 1);

    let book = batch.book_id("b1").unwrap();
    let alice = batch.engine().store().user_by_username("alice").unwrap();
    assert_eq!(batch.engine().quote(book).unwrap().owner_id, alice.id);
}

#[test]
fn test_purchase_unknown_book_ignored() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,10,,\n\
                     purchase,alice,ghost,,,\n");
    assert_eq!(balance(&batch, "alice"), "10.00");
}

// ==================== RENTAL EDGE CASES ====================

#[test]
fn test_rental_periods() {
    for (days, expected) in [(1, "98.00"), (3, "94.00"), (7, "86.00"), (14, "72.00"), (30, "40.00")] {
        let batch = run(&format!(
            "register,alice,,,,\n\
             register,bob,,,,\n\
             deposit,alice,,100,,\n\
             list,bob,b1,50,2,\n\
             rent,alice,b1,,,{}\n",
            days
        ));
        assert_eq!(balance(&batch, "alice"), expected, "{} days", days);
    }
}

#[test]
fn test_unsupported_rental_period_ignored() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,alice,,100,,\n\
                     list,bob,b1,50,2,\n\
                     rent,alice,b1,,,2\n\
                     rent,alice,b1,,,0\n\
                     rent,alice,b1,,,31\n");
    assert_eq!(balance(&batch, "alice"), "100.00");
    assert!(batch.engine().store().rentals().is_empty());
}

#[test]
fn test_rented_book_blocks_second_rental() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     register,carol,,,,\n\
                     deposit,alice,,100,,\n\
                     deposit,carol,,100,,\n\
                     list,bob,b1,50,2,\n\
                     rent,alice,b1,,,7\n\
                     rent,carol,b1,,,1\n");
    assert_eq!(balance(&batch, "carol"), "100.00");
    assert_eq!(batch.engine().store().rentals().len(), 1);
}

#[test]
fn test_return_by_other_student_ignored() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     register,carol,,,,\n\
                     deposit,alice,,100,,\n\
                     list,bob,b1,50,2,\n\
                     rent,alice,b1,,,7\n\
                     return,carol,b1,,,\n");
    let book = batch.book_id("b1").unwrap();
    assert_eq!(batch.engine().quote(book).unwrap().status, BookStatus::Rented);
}

#[test]
fn test_returned_book_can_be_bought() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     register,carol,,,,\n\
                     deposit,alice,,100,,\n\
                     deposit,carol,,100,,\n\
                     list,bob,b1,50,2,\n\
                     rent,alice,b1,,,7\n\
                     return,alice,b1,,,\n\
                     return,alice,b1,,,\n\
                     purchase,carol,b1,,,\n");
    let out = output(&batch);
    let (bal, _, earned, _, _) = parse_wallet(&wallet_line(&out, "bob").unwrap());
    assert_eq!(bal, "64.00");
    assert_eq!(earned, "64.00");

    let kinds: Vec<TxType> = batch
        .engine()
        .store()
        .transactions()
        .iter()
        .map(|t| t.kind())
        .collect();
    assert_eq!(kinds, vec![TxType::Rental, TxType::Purchase]);
}

// ==================== ACCOUNT EDGE CASES ====================

#[test]
fn test_duplicate_registration_keeps_first_wallet() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,10,,\n\
                     register,alice,,,,\n");
    let out = output(&batch);
    assert_eq!(out.lines().count(), 2);
    assert_eq!(balance(&batch, "alice"), "10.00");
}

#[test]
fn test_admin_has_no_wallet_row() {
    let batch = run("admin,admin,,,,\n\
                     deposit,admin,,10,,\n\
                     register,alice,,,,\n");
    let out = output(&batch);
    assert!(wallet_line(&out, "admin").is_none());
    assert!(wallet_line(&out, "alice").is_some());
}

#[test]
fn test_promoted_student_stops_trading() {
    let batch = run("admin,admin,,,,\n\
                     register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,alice,,50,,\n\
                     list,bob,b1,10,1,\n\
                     promote,admin,alice,,,\n\
                     purchase,alice,b1,,,\n");
    assert_eq!(balance(&batch, "alice"), "50.00");
    assert!(batch.engine().store().transactions().is_empty());
}

#[test]
fn test_student_cannot_moderate() {
    let batch = run("register,alice,,,,\n\
                     register,bob,,,,\n\
                     deposit,bob,,10,,\n\
                     deactivate,alice,bob,,,\n\
                     deposit,bob,,10,,\n");
    assert_eq!(balance(&batch, "bob"), "20.00");
}

// ==================== MALFORMED INPUT ====================

#[test]
fn test_malformed_rows_skipped() {
    let batch = run("register,alice,,,,\n\
                     deposit,alice,,ten,,\n\
                     deposit,alice,,,,\n\
                     ,alice,,5,,\n\
                     teleport,alice,,5,,\n\
                     deposit,alice,,5,,\n");
    assert_eq!(balance(&batch, "alice"), "5.00");
}

#[test]
fn test_short_rows_tolerated() {
    let batch = run("register,alice\n\
                     deposit,alice,,7\n");
    assert_eq!(balance(&batch, "alice"), "7.00");
}
