//! # Tax Calculator Benchmarks
//!
//! Per-line tax computation across regimes and state pairs, plus the document
//! totals fold over batches of lines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::time::Duration;
use uuid::Uuid;

use nfe_issuer::{
    fiscal::{tax_calculator::TaxInput, BrazilianState, TaxCalculator, TaxRegime},
    models::fiscal_document::{dto::ItemRequest, DocumentTotals, LineItem},
};

fn input(regime: TaxRegime, issuer: BrazilianState, customer: BrazilianState) -> TaxInput {
    TaxInput {
        regime,
        issuer_state: issuer,
        customer_state: customer,
        unit_price: Decimal::new(12_345, 2),
        quantity: Decimal::new(7, 0),
        ipi_rate: Some(Decimal::from(10)),
    }
}

fn item_request(index: usize) -> ItemRequest {
    ItemRequest {
        product_id: None,
        code: format!("SKU-{}", index),
        description: "Produto de teste".to_string(),
        ncm: "73181500".to_string(),
        cfop: "6102".to_string(),
        cest: None,
        gtin: None,
        unit: "UN".to_string(),
        quantity: Decimal::from(1 + index as i64 % 5),
        unit_price: Decimal::new(999 + index as i64, 2),
        discount: Decimal::ZERO,
        freight: Decimal::ZERO,
        insurance: Decimal::ZERO,
        other_expenses: Decimal::ZERO,
        ipi_rate: None,
    }
}

/// Benchmark: one line per regime and operation kind
pub fn benchmark_calculate_item(c: &mut Criterion) {
    let calculator = TaxCalculator::default();
    let mut group = c.benchmark_group("calculate_item");

    let cases = [
        ("intrastate_presumido", input(TaxRegime::LucroPresumido, BrazilianState::Sp, BrazilianState::Sp)),
        ("interstate_reduced_real", input(TaxRegime::LucroReal, BrazilianState::Sp, BrazilianState::Ba)),
        ("interstate_standard_real", input(TaxRegime::LucroReal, BrazilianState::Ba, BrazilianState::Sp)),
        ("simples", input(TaxRegime::SimplesNacional, BrazilianState::Rj, BrazilianState::Mg)),
    ];

    for (name, case) in cases.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), case, |b, case| {
            b.iter(|| black_box(calculator.calculate_item(black_box(case)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark: taxing a full document and folding its totals
pub fn benchmark_document_totals(c: &mut Criterion) {
    let calculator = TaxCalculator::default();
    let mut group = c.benchmark_group("document_totals");

    for size in [1usize, 50, 990].iter() {
        let requests: Vec<ItemRequest> = (0..*size).map(item_request).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &requests, |b, requests| {
            b.iter(|| {
                let document_id = Uuid::nil();
                let lines: Vec<LineItem> = requests
                    .iter()
                    .enumerate()
                    .map(|(index, request)| {
                        let tax = calculator.calculate_item(&TaxInput {
                            regime: TaxRegime::LucroReal,
                            issuer_state: BrazilianState::Sp,
                            customer_state: BrazilianState::Pe,
                            unit_price: request.unit_price,
                            quantity: request.quantity,
                            ipi_rate: request.ipi_rate,
                        })
                        .unwrap();
                        LineItem::build(document_id, index as i32 + 1, request, &tax).unwrap()
                    })
                    .collect();
                black_box(DocumentTotals::from_items(&lines))
            })
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = benchmark_calculate_item, benchmark_document_totals
}
criterion_main!(benches);
