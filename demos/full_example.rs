use fin_modeler::*;
use std::error::Error;

fn build_company() -> Company {
    let mut company = Company::new("Nordic Tools AB", "NTOOL", "SEK")
        .with_description("Hand tools and industrial fasteners");

    company.add_item(LineItem::with_historical(
        "Revenue",
        LineItemKind::Revenue,
        [("2020", 720.0), ("2021", 800.0), ("2022", 900.0), ("2023", 1000.0)],
    ));
    company.add_item(LineItem::with_historical(
        "Net Income",
        LineItemKind::Result,
        [("2020", 61.0), ("2021", 72.0), ("2022", 85.0), ("2023", 100.0)],
    ));
    company.add_item(LineItem::with_historical(
        "Operating Cash Flow",
        LineItemKind::CashFlowOperating,
        [("2021", 95.0), ("2022", 110.0), ("2023", 124.0)],
    ));
    company
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("📊 Building company...\n");
    let mut company = build_company();
    company.add_kpi("NetMargin", "Net_Income / Revenue * 100")?;
    company.add_percentage_change_kpi("RevenueGrowth", "Revenue", 1)?;

    let assumptions = AssumptionSet::new().with("revenue_growth", 0.08);

    let rules = vec![
        ForecastRule::new("Revenue", ForecastMethod::growth_from_assumption("revenue_growth")),
        ForecastRule::new(
            "Net Income",
            ForecastMethod::MarginOf {
                base_item: "Revenue".to_string(),
                margin: 0.11,
            },
        ),
        ForecastRule::new(
            "Operating Cash Flow",
            ForecastMethod::Statistical(StatisticalMethod::HoltWinters(HoltWintersParams {
                trend: SmoothingComponent::Additive,
                ..HoltWintersParams::new(5)
            })),
        ),
    ];

    {
        let mut model = ForecastModel::new(&mut company, assumptions.clone(), ForecastConfig::default());
        model.add_forecast_rules(rules.clone());
        model.run_forecast()?;
    }

    let table = ForecastTable::from_items(&company, &["Revenue", "Net Income", "Operating Cash Flow"])?;
    println!("{}", table.to_markdown());

    let margin = company.calculate_kpi("NetMargin")?;
    let growth = company.calculate_kpi("RevenueGrowth")?;
    println!(
        "{}",
        markdown_series_table(&[&margin, &growth], &["Net Margin %", "Revenue Growth %"])
    );

    let valuation = DividendDiscountModel::new(&company, ValuationConfig::default());
    let summary = ValuationSummary::generate(&company, &valuation, 50.0, Some(9.5))?;
    println!("{}", summary.to_text());

    println!("🔀 Comparing scenarios...\n");
    let runner = ScenarioRunner::new(&company, 50.0, Some(9.5), ScenarioConfig::default()).with_rules(rules);
    let results = runner.compare(&[
        ("Bear", assumptions.clone().with("revenue_growth", 0.02)),
        ("Base", assumptions.clone()),
        ("Bull", assumptions.with("revenue_growth", 0.14)),
    ])?;
    for result in &results {
        println!(
            "  {:<5} {:>10.2} per share, margin of safety {}",
            result.label,
            result.intrinsic_value_per_share,
            result
                .margin_of_safety
                .map(|m| format!("{:.1}%", m * 100.0))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    let path = std::env::temp_dir().join("nordic_tools.json");
    company.save_to_json(&path)?;
    println!("\n✅ Saved model to {}", path.display());

    Ok(())
}
