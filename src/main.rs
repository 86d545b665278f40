//! vibedb-codegen - compile and run demo expressions over SQL values

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use log::info;
use std::cmp::Ordering;
use std::sync::Arc;
use vibedb_codegen::config::{CodegenConfig, NullOrder, OnError};
use vibedb_codegen::expression::{
    BinaryOperator, CompiledExpression, Expression, ExpressionCompiler, SortKey,
};
use vibedb_codegen::types::{SqlType, TypeId, TypeRegistry};
use vibedb_codegen::value::Value;

/// Compile a demo scenario, print its IR and run it
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario to run
    #[arg(value_enum)]
    scenario: Scenario,

    /// What arithmetic faults do
    #[arg(long, value_enum, default_value = "exception")]
    on_error: ErrorPolicy,

    /// Where NULLs sort
    #[arg(long, value_enum, default_value = "first")]
    nulls: Nulls,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scenario {
    /// INTEGER addition that overflows
    Overflow,
    /// CASE merging a constant and a NULL
    Phi,
    /// Three-valued AND / OR truth tables
    Logic,
    /// ORDER BY over nullable keys
    Sort,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ErrorPolicy {
    Null,
    Exception,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Nulls {
    First,
    Last,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = CodegenConfig::new()
        .with_on_error(match args.on_error {
            ErrorPolicy::Null => OnError::ReturnNull,
            ErrorPolicy::Exception => OnError::Exception,
        })
        .with_null_order(match args.nulls {
            Nulls::First => NullOrder::First,
            Nulls::Last => NullOrder::Last,
        });
    info!("running {:?} with {:?}", args.scenario, config);

    let registry = Arc::new(TypeRegistry::with_builtins());
    match args.scenario {
        Scenario::Overflow => overflow(registry, config),
        Scenario::Phi => phi(registry, config),
        Scenario::Logic => logic(registry, config),
        Scenario::Sort => sort(registry, config),
    }
}

fn dump(compiled: &CompiledExpression) {
    println!("{}", compiled.function());
    println!("-- result type: {}", compiled.result_type());
}

fn show(compiled: &CompiledExpression, row: &[Value]) {
    let inputs: Vec<String> = row.iter().map(|v| v.to_string()).collect();
    match compiled.evaluate(row) {
        Ok(value) => println!("({}) => {}", inputs.join(", "), value),
        Err(e) => println!("({}) => ERROR: {:#}", inputs.join(", "), e),
    }
}

fn overflow(registry: Arc<TypeRegistry>, config: CodegenConfig) -> Result<()> {
    let compiler = ExpressionCompiler::with_config(registry, vec![SqlType::not_null(TypeId::INTEGER)], config);
    let expr = Expression::add_expr(Expression::column(0), Expression::literal(Value::Integer(1)));
    let compiled = compiler.compile(&expr).context("Failed to compile overflow scenario")?;
    dump(&compiled);
    for v in [41, i32::MAX] {
        show(&compiled, &[Value::Integer(v)]);
    }
    Ok(())
}

fn phi(registry: Arc<TypeRegistry>, config: CodegenConfig) -> Result<()> {
    let compiler = ExpressionCompiler::with_config(registry, vec![SqlType::nullable(TypeId::BOOLEAN)], config);
    let expr = Expression::case(
        vec![(Expression::column(0), Expression::literal(Value::Integer(5)))],
        Some(Expression::null(TypeId::INTEGER)),
    );
    let compiled = compiler.compile(&expr).context("Failed to compile phi scenario")?;
    dump(&compiled);
    for v in [Value::Boolean(true), Value::Boolean(false), Value::Null] {
        show(&compiled, &[v]);
    }
    Ok(())
}

fn logic(registry: Arc<TypeRegistry>, config: CodegenConfig) -> Result<()> {
    let schema = vec![SqlType::nullable(TypeId::BOOLEAN); 2];
    let compiler = ExpressionCompiler::with_config(registry, schema, config);
    let inputs = [Value::Boolean(true), Value::Boolean(false), Value::Null];
    for op in [BinaryOperator::And, BinaryOperator::Or] {
        let expr = Expression::binary_op(op, Expression::column(0), Expression::column(1));
        let compiled = compiler
            .compile(&expr)
            .with_context(|| format!("Failed to compile {}", op.as_str()))?;
        println!("-- {}", op.as_str());
        for l in &inputs {
            for r in &inputs {
                show(&compiled, &[l.clone(), r.clone()]);
            }
        }
    }
    Ok(())
}

fn sort(registry: Arc<TypeRegistry>, config: CodegenConfig) -> Result<()> {
    let schema = vec![SqlType::nullable(TypeId::INTEGER), SqlType::not_null(TypeId::VARCHAR)];
    let compiler = ExpressionCompiler::with_config(registry, schema, config);
    let comparator = compiler
        .compile_sort_comparator(&[SortKey::asc(0), SortKey::desc(1)])
        .context("Failed to compile sort comparator")?;
    dump(&comparator);

    let mut rows = vec![
        vec![Value::Integer(2), Value::Varchar("b".to_string())],
        vec![Value::Null, Value::Varchar("x".to_string())],
        vec![Value::Integer(1), Value::Varchar("a".to_string())],
        vec![Value::Integer(2), Value::Varchar("c".to_string())],
        vec![Value::Null, Value::Varchar("y".to_string())],
    ];
    insertion_sort(&comparator, &mut rows)?;
    for row in &rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    Ok(())
}

/// Sort with a generated comparator, stopping at its first error
fn insertion_sort(comparator: &CompiledExpression, rows: &mut [Vec<Value>]) -> Result<()> {
    for i in 1..rows.len() {
        let mut j = i;
        while j > 0 && compare(comparator, &rows[j - 1], &rows[j])? == Ordering::Greater {
            rows.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

fn compare(comparator: &CompiledExpression, left: &[Value], right: &[Value]) -> Result<Ordering> {
    match comparator.evaluate_pair(left, right)? {
        Value::Integer(order) => Ok(order.cmp(&0)),
        other => anyhow::bail!("Comparator returned {}", other),
    }
}
