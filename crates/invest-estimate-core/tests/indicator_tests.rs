use invest_estimate_core::indicators::{
    financial_indicators, irr, npv, payback, IndicatorInput, IrrEstimate, Payback,
    ProjectCashFlowInput, DEFAULT_IRR_GUESS,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Scenario C: sign changes
// ===========================================================================

#[test]
fn test_single_sign_change_gives_one_irr() {
    // Two construction years then ten operating years
    let mut flows = vec![dec!(-3000), dec!(-2000)];
    flows.extend(std::iter::repeat(dec!(900)).take(10));

    let rate = irr(&flows, DEFAULT_IRR_GUESS)
        .rate()
        .expect("IRR should be computable");
    assert!(rate > dec!(0.05) && rate < dec!(0.15), "irr {rate}");

    let residual = npv(rate, &flows).unwrap();
    assert!(residual.abs() <= dec!(0.0001), "NPV at IRR = {residual}");
}

#[test]
fn test_all_positive_not_computable() {
    let flows = vec![dec!(100), dec!(200), dec!(300)];
    match irr(&flows, DEFAULT_IRR_GUESS) {
        IrrEstimate::NotComputable { reason } => assert!(reason.contains("sign")),
        other => panic!("Expected NotComputable, got {other:?}"),
    }
}

#[test]
fn test_all_negative_not_computable() {
    let flows = vec![dec!(-100), dec!(-200)];
    assert!(irr(&flows, DEFAULT_IRR_GUESS).rate().is_none());
}

// ===========================================================================
// Payback
// ===========================================================================

#[test]
fn test_static_payback_interpolated() {
    // cumulative: -1000, -600, -200, 200 -> 3 + 200/400
    let flows = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
    assert_eq!(payback(&flows).years(), Some(dec!(3.5)));
}

#[test]
fn test_dynamic_payback_is_later_than_static() {
    let mut flows = vec![dec!(-1000)];
    flows.extend(std::iter::repeat(dec!(300)).take(6));
    let out = financial_indicators(&IndicatorInput {
        discount_rate: dec!(0.08),
        pre_tax_cash_flows: flows,
        post_tax_cash_flows: None,
        project: None,
        irr_guess: None,
    })
    .unwrap();
    let set = &out.result.pre_tax;

    let static_years = set.static_payback.years().unwrap();
    let dynamic_years = set.dynamic_payback.years().unwrap();
    assert!(dynamic_years > static_years);
    assert!(out.result.post_tax.is_none());
}

#[test]
fn test_unrecovered_horizon_warns() {
    let out = financial_indicators(&IndicatorInput {
        discount_rate: dec!(0.08),
        pre_tax_cash_flows: vec![dec!(-1000), dec!(100), dec!(100)],
        post_tax_cash_flows: None,
        project: None,
        irr_guess: None,
    })
    .unwrap();
    assert_eq!(out.result.pre_tax.static_payback, Payback::Unrecovered);
    assert!(out.warnings.iter().any(|w| w.contains("not recovered")));
}

// ===========================================================================
// Project flows
// ===========================================================================

#[test]
fn test_project_flows_produce_both_series() {
    let out = financial_indicators(&IndicatorInput {
        discount_rate: dec!(0.06),
        pre_tax_cash_flows: Vec::new(),
        post_tax_cash_flows: None,
        project: Some(ProjectCashFlowInput {
            construction_outlays: vec![dec!(4000), dec!(3000)],
            operating_inflows: vec![dec!(2500); 12],
            operating_outflows: vec![dec!(1200); 12],
            income_tax: vec![dec!(150); 12],
            residual_value: dec!(500),
        }),
        irr_guess: None,
    })
    .unwrap();
    let result = &out.result;
    let post = result.post_tax.as_ref().expect("post-tax series");

    assert_eq!(result.pre_tax.cash_flows.len(), 14);
    assert_eq!(result.pre_tax.cash_flows[0].flow, dec!(-4000));
    assert_eq!(result.pre_tax.cash_flows[13].flow, dec!(1800));
    assert_eq!(post.cash_flows[13].flow, dec!(1650));
    assert!(result.pre_tax.npv > post.npv);

    let pre_irr = result.pre_tax.irr.rate().unwrap();
    let post_irr = post.irr.rate().unwrap();
    assert!(pre_irr > post_irr);
}

#[test]
fn test_npv_matches_table_total() {
    let flows = vec![dec!(-500), dec!(200), dec!(200), dec!(200)];
    let out = financial_indicators(&IndicatorInput {
        discount_rate: dec!(0.1),
        pre_tax_cash_flows: flows,
        post_tax_cash_flows: None,
        project: None,
        irr_guess: None,
    })
    .unwrap();
    let set = &out.result.pre_tax;
    let last = set.cash_flows.last().unwrap();
    assert!((set.npv - last.discounted_cumulative).abs() < dec!(0.000001));
    assert_eq!(last.cumulative, dec!(100));
}

#[test]
fn test_discount_rate_at_minus_one_rejected() {
    let result = financial_indicators(&IndicatorInput {
        discount_rate: dec!(-1),
        pre_tax_cash_flows: vec![dec!(-1), dec!(2)],
        post_tax_cash_flows: None,
        project: None,
        irr_guess: None,
    });
    assert!(result.is_err());
    assert!(npv(dec!(-1.5), &[Decimal::ONE]).is_err());
}
