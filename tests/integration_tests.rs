//! Integration tests for statement ingestion
//!
//! These tests drive the public API end to end:
//! - Alipay CSV in UTF-8 and GB18030
//! - row-level warnings that never abort a file
//! - deterministic ids and idempotent commits
//! - CCB spreadsheets built on the fly
//! - extractor selection, including PDF content sniffing
//! - cross-source duplicate flags


use anyhow::Result;
use chrono::NaiveDate;
use ledger_ingest::commit::{CommitBatch, CommitSink, InMemoryLedger};
use ledger_ingest::dedup::{CrossSourceDeduplicator, DedupConfig, MatchReason};
use ledger_ingest::importers::cmb_pdf::parse_cmb_text;
use ledger_ingest::models::{CanonicalField, Direction, Source, SourceType};
use ledger_ingest::{import_file, parse_bytes, ImportError, ImportHints, ParseOptions};
use rust_decimal_macros::dec;

use cli_helpers::{ccb_statement_xlsx, statement_pdf, CcbRow, ALIPAY_SAMPLE};

const ALIPAY_HEADER: &str = "交易时间,交易分类,交易对方,对方账号,商品说明,收/支,金额,收/付款方式,交易状态,交易订单号,商家订单号,备注,";

fn parse_alipay(bytes: &[u8]) -> ledger_ingest::Result<ledger_ingest::ParseResult> {
    parse_bytes(
        bytes,
        Some("支付宝交易明细.csv"),
        &ImportHints::default(),
        &ParseOptions::default(),
    )
}

fn batch(result: &ledger_ingest::ParseResult) -> CommitBatch {
    CommitBatch {
        drafts: result.drafts.clone(),
        warning_count: result.warnings.len(),
        file_name: ALIPAY_SAMPLE.to_string(),
        file_size: 0,
    }
}

#[test]
fn test_alipay_sample_end_to_end() -> Result<()> {
    let result = import_file(ALIPAY_SAMPLE, &ImportHints::default(), &ParseOptions::default())?;

    assert_eq!(result.source, Source::Alipay);
    assert_eq!(result.source_type, SourceType::Csv);
    assert_eq!(result.row_count, 2);
    // the 不计收支 zero row is dropped silently
    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);

    let lunch = &result.drafts[0];
    assert_eq!(
        lunch.occurred_at,
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    );
    assert_eq!(lunch.amount, dec!(35.00));
    assert_eq!(lunch.direction, Direction::Out);
    assert_eq!(lunch.counterparty.as_deref(), Some("便利店"));
    assert_eq!(lunch.currency.as_deref(), Some("CNY"));
    assert_eq!(lunch.transaction_ref.as_deref(), Some("2024010522001100001"));
    assert_eq!(lunch.source_row_id, "alipay:2024010522001100001");

    let transfer = &result.drafts[1];
    assert_eq!(transfer.direction, Direction::In);
    assert_eq!(transfer.amount, dec!(200.00));
    assert_eq!(transfer.counterparty.as_deref(), Some("李四"));

    Ok(())
}

#[test]
fn test_gb18030_export_matches_utf8() -> Result<()> {
    let utf8 = std::fs::read_to_string(ALIPAY_SAMPLE)?;
    let (encoded, _, had_errors) = encoding_rs::GB18030.encode(&utf8);
    assert!(!had_errors);

    let from_gbk = parse_alipay(&encoded)?;
    let from_utf8 = parse_alipay(utf8.as_bytes())?;
    assert_eq!(from_gbk.drafts, from_utf8.drafts);
    assert_eq!(from_gbk.row_count, 2);

    Ok(())
}

#[test]
fn test_bad_dates_become_warnings_not_failures() -> Result<()> {
    let mut csv = format!("{}\n", ALIPAY_HEADER);
    for i in 0..100 {
        let when = if [10, 50, 90].contains(&i) {
            "not-a-date".to_string()
        } else {
            format!("2024-02-{:02} 10:00:00", i % 28 + 1)
        };
        csv.push_str(&format!(
            "{},日用百货,商户{},,商品{},支出,{}.50,余额,交易成功,REF{:04},,,\n",
            when,
            i,
            i,
            i + 1,
            i
        ));
    }

    let result = parse_alipay(csv.as_bytes())?;
    assert_eq!(result.row_count, 97);
    assert_eq!(result.warnings.len(), 3);
    assert!(result
        .warnings
        .iter()
        .all(|w| w.field == Some(CanonicalField::OccurredAt)));
    // header is line 1, record i sits on line i + 2
    let rows: Vec<usize> = result.warnings.iter().map(|w| w.row).collect();
    assert_eq!(rows, vec![12, 52, 92]);

    Ok(())
}

#[test]
fn test_reimport_is_deterministic_and_idempotent() -> Result<()> {
    let first = import_file(ALIPAY_SAMPLE, &ImportHints::default(), &ParseOptions::default())?;
    let second = import_file(ALIPAY_SAMPLE, &ImportHints::default(), &ParseOptions::default())?;
    assert_eq!(first, second);

    let ledger = InMemoryLedger::new();
    let initial = ledger.commit(batch(&first))?;
    assert_eq!(initial.inserted, 2);
    assert_eq!(initial.skipped, 0);

    let again = ledger.commit(batch(&second))?;
    assert_eq!(again.inserted, 0);
    assert_eq!(again.skipped, 2);
    assert_eq!(ledger.len(), 2);

    Ok(())
}

#[test]
fn test_missing_header_is_fatal() {
    let text = "导出信息：\n姓名：张三\n随便写的一行\n";
    let err = parse_alipay(text.as_bytes()).unwrap_err();
    assert!(matches!(err, ImportError::HeaderNotFound { .. }), "got {:?}", err);
}

#[test]
fn test_missing_amount_column_is_fatal() {
    let text = "交易时间,交易对方,收/支\n2024-01-05 12:30:00,便利店,支出\n";
    let err = parse_alipay(text.as_bytes()).unwrap_err();
    assert!(matches!(err, ImportError::MissingColumn(CanonicalField::Amount)));
}

#[test]
fn test_ccb_workbook_from_bytes() -> Result<()> {
    let bytes = ccb_statement_xlsx(&[
        CcbRow {
            date: "20240105",
            summary: "消费",
            amount: -35.0,
            balance: 965.0,
            counterparty: "支付宝-便利店",
        },
        CcbRow {
            date: "20240106",
            summary: "转账存入",
            amount: 2000.0,
            balance: 2965.0,
            counterparty: "6222021234567890 李四",
        },
    ])?;

    let result = parse_bytes(
        &bytes,
        Some("建设银行明细.xlsx"),
        &ImportHints::default(),
        &ParseOptions::default(),
    )?;

    assert_eq!(result.source, Source::Ccb);
    assert_eq!(result.source_type, SourceType::Xls);
    assert_eq!(result.row_count, 2);
    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);

    let spend = &result.drafts[0];
    assert_eq!(spend.direction, Direction::Out);
    assert_eq!(spend.amount, dec!(35));
    assert_eq!(spend.description.as_deref(), Some("消费"));
    assert_eq!(spend.account_name.as_deref(), Some("建设银行储蓄卡(5678)"));

    let deposit = &result.drafts[1];
    assert_eq!(deposit.direction, Direction::In);
    assert_eq!(deposit.counterparty.as_deref(), Some("李四"));
    assert_eq!(deposit.counterparty_account.as_deref(), Some("6222021234567890"));

    Ok(())
}

fn parse_unnamed_pdf(bytes: &[u8]) -> ledger_ingest::Result<ledger_ingest::ParseResult> {
    parse_bytes(
        bytes,
        Some("statement.pdf"),
        &ImportHints::default(),
        &ParseOptions::default(),
    )
}

#[test]
fn test_pdf_content_selects_cmb() -> Result<()> {
    let bytes = statement_pdf(&[
        "China Merchants Bank",
        "2024-01-05 CNY -35.00 1,234.56 Alipay Store",
        "2024-01-06 CNY 5,000.00 6,234.56 Payroll ACME",
    ])?;

    let result = parse_unnamed_pdf(&bytes)?;
    assert_eq!(result.source, Source::Cmb);
    assert_eq!(result.source_type, SourceType::Pdf);
    assert_eq!(result.row_count, 2);

    let spend = &result.drafts[0];
    assert_eq!(spend.direction, Direction::Out);
    assert_eq!(spend.amount, dec!(35.00));
    assert_eq!(spend.balance, Some(dec!(1234.56)));
    assert_eq!(result.drafts[1].direction, Direction::In);

    Ok(())
}

#[test]
fn test_pdf_content_selects_bocom() -> Result<()> {
    let bytes = statement_pdf(&[
        "BANK OF COMMUNICATIONS",
        "2024-01-05 10:11:12 A1B2C3D4E5 Online -35.00 1,234.56 Alipay 215500690",
    ])?;

    let result = parse_unnamed_pdf(&bytes)?;
    assert_eq!(result.source, Source::Bocom);
    assert_eq!(result.row_count, 1);
    assert_eq!(result.drafts[0].source_row_id, "bocom:A1B2C3D4E5");
    assert_eq!(result.drafts[0].amount, dec!(35.00));

    Ok(())
}

#[test]
fn test_pdf_without_bank_markers_is_unrecognized() -> Result<()> {
    let bytes = statement_pdf(&["Monthly summary", "Nothing to see here"])?;
    let err = parse_unnamed_pdf(&bytes).unwrap_err();
    assert!(
        matches!(&err, ImportError::UnrecognizedFile(name) if name == "statement.pdf"),
        "got {:?}",
        err
    );
    Ok(())
}

#[test]
fn test_unknown_file_is_unrecognized() {
    let err = parse_bytes(
        b"hello",
        Some("notes.txt"),
        &ImportHints::default(),
        &ParseOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::UnrecognizedFile(_)));
}

#[test]
fn test_hint_that_contradicts_container_is_rejected() -> Result<()> {
    let bytes = std::fs::read(ALIPAY_SAMPLE)?;
    let hints = ImportHints::new(Some(Source::Cmb), None);
    let err = parse_bytes(&bytes, Some("alipay_sample.csv"), &hints, &ParseOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::UnsupportedCombination {
            institution: Source::Cmb,
            source_type: SourceType::Csv,
        }
    ));
    Ok(())
}

#[test]
fn test_bank_row_mirroring_alipay_is_flagged() -> Result<()> {
    let alipay = import_file(ALIPAY_SAMPLE, &ImportHints::default(), &ParseOptions::default())?;
    let cmb = parse_cmb_text(
        "记账日期 货币 交易金额 联机余额 交易摘要 对手信息\n\
         2024-01-05 CNY -35.00 1,234.56 快捷支付 支付宝-便利店\n\
         2024-01-09 CNY -200.00 1,034.56 快捷支付 其他商户\n",
    );
    assert_eq!(cmb.row_count, 2);

    let drafts: Vec<_> = cmb.drafts.into_iter().chain(alipay.drafts).collect();
    let flags = CrossSourceDeduplicator::new(DedupConfig::default()).find_duplicates(&drafts);

    assert_eq!(flags.len(), 1);
    let flag = &flags[0];
    assert_eq!(flag.bank_index, 0);
    assert_eq!(drafts[flag.platform_index].source, Source::Alipay);
    assert_eq!(flag.reason, MatchReason::PlatformKeyword);
    // bank row has no time of day, Alipay row is at 12:30
    assert_eq!(flag.time_delta_minutes, 750);

    Ok(())
}
