//! Integration tests driving the real framer/transceiver/console stack
//! against an in-memory double, covering the scripted exchanges that
//! illustrate startup, CRC recovery, a blocked fiscal closing, a broadcast
//! rewind, and a full sale.

mod support;

use std::time::Duration;

use rust_decimal::Decimal;

use smart3::console::Listener;
use smart3::control::{ACK, DLE};
use smart3::operations::{BroadcastPluInfo, FiscalClosing, Operation, Startup, Transact};
use smart3::plu::PluInfo;

use support::{console_with_script, inbound_frame, ACK_BYTE};

/// A clean `A01` hello with no error flags, Programming mode — the same
/// fixture `status::tests::parses_basic_hello` checks.
const CLEAN_A01: &str = "A01:068:128:192:3112991159:SMARTIII:R000001:";

/// Same hello, but with `operating_error` set (byte 3, bit 0) by bumping
/// 192 to 193.
const OPERATING_ERROR_A01: &str = "A01:068:128:193:3112991159:SMARTIII:R000001:";

/// `A01` with `fiscal_memory_full` set (byte 3, bit 4: 192 + 16 = 208).
const FISCAL_MEMORY_FULL_A01: &str = "A01:068:128:208:3112991159:SMARTIII:R000001:";

fn plu(id: &str) -> PluInfo {
    PluInfo::new(id, "Widget", "9.99".parse().unwrap(), 1, 1, 0, 1).unwrap()
}

#[test]
fn startup_reads_connectability_and_locks_the_keyboard() {
    let mut script = Vec::new();
    script.extend(inbound_frame(CLEAN_A01, 0, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("C24:0:0:*", 1, 0));

    let (mut console, port) = console_with_script(script);
    let mut startup = Startup::new();
    startup.run(&mut console).expect("startup dialogue should complete");

    assert!(startup.connectability().is_none(), "only a terminator record was ever sent");

    let sent = port.take_outbound();
    assert_eq!(sent[0], DLE, "startup sends a non-immediate hello first");
    let text = String::from_utf8_lossy(&sent);
    assert!(text.contains("*2"), "the A01 reply must lock the keyboard");
    assert!(text.contains("&m"), "the A01 reply must enter programming mode");
}

#[test]
fn a_corrupted_frame_is_nakked_and_the_retransmit_recovers() {
    let good = inbound_frame("C24:0:0:*", 0, 0);
    let mut corrupted = good.clone();
    let parity_pos = corrupted.len() - 2;
    corrupted[parity_pos] ^= 0x01;

    let mut script = corrupted;
    script.extend(good);

    let (mut console, port) = console_with_script(script);
    let mut seen = false;
    let mut listener = Listener::new(vec!["C24"], |message| {
        seen = message.field(3) == Some("*");
        Ok(())
    });
    console.listen(&mut listener).expect("the retransmit should be accepted");
    assert!(seen);

    let sent = port.take_outbound();
    assert!(sent.contains(&smart3::control::NAK), "a NAK must follow the corrupted frame");
    assert!(sent.contains(&ACK), "the recovered frame must still be acknowledged");
}

#[test]
fn fiscal_closing_is_refused_when_fiscal_memory_is_full() {
    let script = inbound_frame(FISCAL_MEMORY_FULL_A01, 0, 0);
    let (mut console, _port) = console_with_script(script);
    let mut closing = FiscalClosing::new();
    let err = closing.run(&mut console).expect_err("a full fiscal memory must block the closing");
    assert!(matches!(
        err,
        smart3::Smart3Error::CashRegister(smart3::CashRegisterError::FiscalMemoryFull)
    ));
}

#[test]
fn broadcast_plu_info_rewinds_on_a_partial_block_confirmation() {
    let plus: Vec<PluInfo> = (1..=150).map(|n| plu(&format!("{n:04}"))).collect();

    let mut script = Vec::new();
    script.extend(inbound_frame(CLEAN_A01, 0, 0));
    script.push(ACK_BYTE);
    // Block 1 (100 records): fully confirmed.
    script.extend(inbound_frame("B99:100", 1, 0));
    script.push(ACK_BYTE);
    // Block 2 (50 records): only 20 of the 50 accepted, reported as the
    // cumulative count 120 — the host must rewind to 100, not advance to 120.
    script.extend(inbound_frame("B99:120", 2, 0));
    script.push(ACK_BYTE);
    // The retransmitted block 2 is fully confirmed this time (cumulative 150).
    script.extend(inbound_frame("B99:150", 3, 0));
    script.push(ACK_BYTE);

    let (mut console, port) = console_with_script(script);
    let mut op = BroadcastPluInfo::new(plus, None, 100, Duration::from_millis(1));
    op.run(&mut console).expect("the broadcast should complete once block 2 is confirmed");

    let sent = port.take_outbound();
    let question_marks = sent.iter().filter(|&&b| b == b'?').count();
    assert_eq!(question_marks, 3, "block 2 is transmitted twice before it is fully confirmed");
    let closing_marker = smart3::packet::encode_broadcast(&[b'*'], None).unwrap();
    assert!(sent.ends_with(&closing_marker), "a trailing '*' frame marks the whole table as broadcast");
}

#[test]
fn a_sale_runs_the_full_clear_sell_subtotal_tender_dialogue() {
    let mut script = Vec::new();
    script.extend(inbound_frame(CLEAN_A01, 0, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B23", 1, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B14", 2, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B14", 3, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B15", 4, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B17", 5, 0));
    script.push(ACK_BYTE);
    script.extend(inbound_frame("B18", 6, 0));
    script.push(ACK_BYTE);

    let (mut console, _port) = console_with_script(script);
    let mut transact = Transact::new(vec![plu("0001"), plu("0002")], Decimal::new(1000, 2));
    transact.run(&mut console).expect("a two-item sale should complete");
}

#[test]
fn a_sale_is_rejected_when_the_register_reports_an_operating_error() {
    let script = inbound_frame(OPERATING_ERROR_A01, 0, 0);
    let (mut console, port) = console_with_script(script);
    let mut transact = Transact::new(vec![plu("0001")], Decimal::new(1000, 2));
    let err = transact.run(&mut console).expect_err("an operating error must reject the sale up front");
    assert!(matches!(
        err,
        smart3::Smart3Error::CashRegister(smart3::CashRegisterError::OperatingError)
    ));

    let sent = port.take_outbound();
    assert_eq!(sent, vec![DLE], "rejection must happen before any keyboard simulation is sent");
}
