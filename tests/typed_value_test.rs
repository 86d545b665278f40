use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::sync::Arc;
use vibedb_codegen::codegen::ir::{Function, IrType};
use vibedb_codegen::codegen::{CodeGen, Interpreter, Materialized, TypedValue};
use vibedb_codegen::config::{CodegenConfig, MinMaxNulls, NullOrder, OnError};
use vibedb_codegen::error::{ArithFault, CodegenError, CodegenResult, RuntimeError};
use vibedb_codegen::types::{BinaryOp, OpOutput, OperatorId, SqlType, TypeId, TypeRegistry};
use vibedb_codegen::value::Value;

/// Builds a function whose parameters are value triples
struct Harness {
    cg: CodeGen,
    inputs: Vec<(SqlType, IrType)>,
}

struct Compiled {
    function: Function,
    inputs: Vec<(SqlType, IrType)>,
    result_type: SqlType,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(CodegenConfig::default())
    }

    fn with_config(config: CodegenConfig) -> Self {
        Self::with_registry(Arc::new(TypeRegistry::with_builtins()), config)
    }

    fn with_registry(registry: Arc<TypeRegistry>, config: CodegenConfig) -> Self {
        Self {
            cg: CodeGen::with_config("harness", registry, config),
            inputs: Vec::new(),
        }
    }

    fn input(&mut self, ty: SqlType) -> TypedValue {
        let ir_type = self.cg.registry().descriptor(ty.id).unwrap().ir_type;
        let materialized = Materialized {
            value: self.cg.add_param(ir_type),
            length: self.cg.add_param(IrType::I32),
            null: self.cg.add_param(IrType::Bool),
        };
        self.inputs.push((ty, ir_type));
        TypedValue::value_from_materialization(&self.cg, ty, materialized).unwrap()
    }

    fn finish(mut self, result: &TypedValue) -> Compiled {
        let out = result.values_for_materialization(&mut self.cg).unwrap();
        self.cg.ret(vec![out.value, out.length, out.null]).unwrap();
        Compiled {
            function: self.cg.finish().unwrap(),
            inputs: self.inputs,
            result_type: result.sql_type(),
        }
    }
}

impl Compiled {
    fn run(&self, row: &[Value]) -> Result<Value> {
        let mut args = Vec::new();
        for (value, (ty, ir_type)) in row.iter().zip(&self.inputs) {
            args.extend(value.to_scalars(*ty, *ir_type)?);
        }
        let out = Interpreter::new(&self.function).run(&args)?;
        match out.as_slice() {
            [v, l, n] => Value::from_scalars(self.result_type, v, l, n),
            _ => bail!("unexpected result arity {}", out.len()),
        }
    }
}

fn int(v: i32) -> Value {
    Value::Integer(v)
}

fn boolean(v: Option<bool>) -> Value {
    v.map(Value::Boolean).unwrap_or(Value::Null)
}

fn arith_error(result: Result<Value>) -> Option<ArithFault> {
    match result.err()?.downcast_ref::<RuntimeError>() {
        Some(RuntimeError::Arithmetic(fault)) => Some(*fault),
        _ => None,
    }
}

#[test]
fn test_materialization_round_trip() -> Result<()> {
    let cases = [
        (SqlType::nullable(TypeId::BOOLEAN), Value::Boolean(true)),
        (SqlType::not_null(TypeId::SMALLINT), Value::SmallInt(-7)),
        (SqlType::nullable(TypeId::INTEGER), int(42)),
        (SqlType::nullable(TypeId::INTEGER), Value::Null),
        (SqlType::not_null(TypeId::BIGINT), Value::BigInt(i64::MIN)),
        (SqlType::nullable(TypeId::DECIMAL), Value::Decimal(2.5)),
        (SqlType::not_null(TypeId::VARCHAR), Value::Varchar("hello".to_string())),
        (SqlType::nullable(TypeId::VARCHAR), Value::Null),
    ];
    for (ty, value) in cases {
        let mut h = Harness::new();
        let input = h.input(ty);
        let compiled = h.finish(&input);
        assert_eq!(compiled.run(&[value.clone()])?, value, "round trip of {}", ty);
    }
    Ok(())
}

#[test]
fn test_three_valued_and_or() -> Result<()> {
    let truth = [Some(true), Some(false), None];

    let mut h = Harness::new();
    let a = h.input(SqlType::nullable(TypeId::BOOLEAN));
    let b = h.input(SqlType::nullable(TypeId::BOOLEAN));
    let and = a.logical_and(&mut h.cg, &b)?;
    let and = h.finish(&and);

    let mut h = Harness::new();
    let a = h.input(SqlType::nullable(TypeId::BOOLEAN));
    let b = h.input(SqlType::nullable(TypeId::BOOLEAN));
    let or = a.logical_or(&mut h.cg, &b)?;
    let or = h.finish(&or);

    for l in truth {
        for r in truth {
            let expected_and = match (l, r) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            let expected_or = match (l, r) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            };
            let row = [boolean(l), boolean(r)];
            assert_eq!(and.run(&row)?, boolean(expected_and), "{:?} AND {:?}", l, r);
            assert_eq!(or.run(&row)?, boolean(expected_or), "{:?} OR {:?}", l, r);
        }
    }
    Ok(())
}

#[test]
fn test_logical_not_keeps_null() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::nullable(TypeId::BOOLEAN));
    let not = a.logical_not(&mut h.cg)?;
    let not = h.finish(&not);
    assert_eq!(not.run(&[boolean(Some(true))])?, boolean(Some(false)));
    assert_eq!(not.run(&[boolean(None)])?, Value::Null);
    Ok(())
}

#[test]
fn test_non_nullable_logic_stays_non_nullable() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let b = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let and = a.logical_and(&mut h.cg, &b)?;
    assert!(!and.is_nullable());
    Ok(())
}

#[test]
fn test_integer_overflow_policy() -> Result<()> {
    for on_error in [OnError::Exception, OnError::ReturnNull] {
        let mut h = Harness::new();
        let a = h.input(SqlType::not_null(TypeId::INTEGER));
        let b = h.input(SqlType::not_null(TypeId::INTEGER));
        let sum = a.add(&mut h.cg, &b, on_error)?;
        assert_eq!(sum.is_nullable(), on_error == OnError::ReturnNull);
        let sum = h.finish(&sum);

        assert_eq!(sum.run(&[int(40), int(2)])?, int(42));
        let overflowed = sum.run(&[int(i32::MAX), int(1)]);
        match on_error {
            OnError::Exception => assert_eq!(arith_error(overflowed), Some(ArithFault::Overflow)),
            OnError::ReturnNull => assert_eq!(overflowed?, Value::Null),
        }
    }
    Ok(())
}

#[test]
fn test_every_arithmetic_operator_overflows() -> Result<()> {
    let cases: [(OperatorId, i32, i32); 4] = [
        (OperatorId::Add, i32::MAX, 1),
        (OperatorId::Sub, i32::MIN, 1),
        (OperatorId::Mul, i32::MAX, 2),
        (OperatorId::Div, i32::MIN, -1),
    ];
    for (op, l, r) in cases {
        let mut h = Harness::new();
        let a = h.input(SqlType::not_null(TypeId::INTEGER));
        let b = h.input(SqlType::not_null(TypeId::INTEGER));
        let result = a.call_binary(&mut h.cg, op, &b, OnError::Exception)?;
        let result = h.finish(&result);
        assert_eq!(
            arith_error(result.run(&[int(l), int(r)])),
            Some(ArithFault::Overflow),
            "{} {} {}",
            l,
            op.as_str(),
            r
        );
    }
    Ok(())
}

#[test]
fn test_division_by_zero_policy() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::INTEGER));
    let b = h.input(SqlType::not_null(TypeId::INTEGER));
    let quotient = a.div(&mut h.cg, &b, OnError::Exception)?;
    let quotient = h.finish(&quotient);
    assert_eq!(quotient.run(&[int(7), int(2)])?, int(3));
    assert_eq!(
        arith_error(quotient.run(&[int(7), int(0)])),
        Some(ArithFault::DivideByZero)
    );

    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::INTEGER));
    let b = h.input(SqlType::not_null(TypeId::INTEGER));
    let remainder = a.modulo(&mut h.cg, &b, OnError::ReturnNull)?;
    let remainder = h.finish(&remainder);
    assert_eq!(remainder.run(&[int(7), int(3)])?, int(1));
    assert_eq!(remainder.run(&[int(7), int(0)])?, Value::Null);
    assert_eq!(remainder.run(&[int(i32::MIN), int(-1)])?, int(0));
    Ok(())
}

#[test]
fn test_decimal_division_by_zero() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::DECIMAL));
    let b = h.input(SqlType::not_null(TypeId::INTEGER));
    let quotient = a.div(&mut h.cg, &b, OnError::Exception)?;
    assert_eq!(quotient.type_id(), TypeId::DECIMAL);
    let quotient = h.finish(&quotient);
    assert_eq!(quotient.run(&[Value::Decimal(5.0), int(2)])?, Value::Decimal(2.5));
    assert_eq!(
        arith_error(quotient.run(&[Value::Decimal(5.0), int(0)])),
        Some(ArithFault::DivideByZero)
    );
    Ok(())
}

#[test]
fn test_null_operand_propagates_without_faulting() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let ops = [
        OperatorId::Add,
        OperatorId::Sub,
        OperatorId::Mul,
        OperatorId::Div,
        OperatorId::Mod,
    ];
    for op in ops {
        for on_error in [OnError::Exception, OnError::ReturnNull] {
            let mut h = Harness::new();
            let a = h.input(SqlType::nullable(TypeId::INTEGER));
            let b = h.input(SqlType::nullable(TypeId::INTEGER));
            let result = a.call_binary(&mut h.cg, op, &b, on_error)?;
            assert!(result.is_nullable());
            let result = h.finish(&result);
            for _ in 0..20 {
                let v = int(rng.gen_range(-100..100));
                // A NULL divisor is encoded as zero; it must not fault
                assert_eq!(result.run(&[Value::Null, v.clone()])?, Value::Null);
                assert_eq!(result.run(&[v, Value::Null])?, Value::Null);
            }
        }
    }
    Ok(())
}

#[test]
fn test_mixed_width_promotion() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::SMALLINT));
    let b = h.input(SqlType::not_null(TypeId::BIGINT));
    let product = a.mul(&mut h.cg, &b, OnError::Exception)?;
    assert_eq!(product.type_id(), TypeId::BIGINT);
    let product = h.finish(&product);
    assert_eq!(
        product.run(&[Value::SmallInt(3), Value::BigInt(5_000_000_000)])?,
        Value::BigInt(15_000_000_000)
    );
    Ok(())
}

#[test]
fn test_narrowing_cast_raises_on_overflow() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::nullable(TypeId::BIGINT));
    let cast = a.cast_to(&mut h.cg, SqlType::not_null(TypeId::INTEGER))?;
    assert_eq!(cast.sql_type(), SqlType::nullable(TypeId::INTEGER));
    let cast = h.finish(&cast);
    assert_eq!(cast.run(&[Value::BigInt(12)])?, int(12));
    assert_eq!(cast.run(&[Value::Null])?, Value::Null);
    assert_eq!(
        arith_error(cast.run(&[Value::BigInt(i64::MAX)])),
        Some(ArithFault::Overflow)
    );
    Ok(())
}

#[test]
fn test_cast_to_varchar() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::INTEGER));
    let text = a.cast_to(&mut h.cg, SqlType::not_null(TypeId::VARCHAR))?;
    let text = h.finish(&text);
    assert_eq!(text.run(&[int(-15)])?, Value::Varchar("-15".to_string()));
    Ok(())
}

#[test]
fn test_comparisons() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::nullable(TypeId::INTEGER));
    let b = h.input(SqlType::not_null(TypeId::BIGINT));
    let lt = a.compare_lt(&mut h.cg, &b)?;
    assert_eq!(lt.sql_type(), SqlType::nullable(TypeId::BOOLEAN));
    let lt = h.finish(&lt);
    assert_eq!(lt.run(&[int(1), Value::BigInt(2)])?, Value::Boolean(true));
    assert_eq!(lt.run(&[int(2), Value::BigInt(2)])?, Value::Boolean(false));
    assert_eq!(lt.run(&[Value::Null, Value::BigInt(2)])?, Value::Null);
    Ok(())
}

#[test]
fn test_varchar_comparison_uses_length() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::VARCHAR));
    let b = h.input(SqlType::not_null(TypeId::VARCHAR));
    let eq = a.compare_eq(&mut h.cg, &b)?;
    let gt = a.compare_gt(&mut h.cg, &b)?;
    let both = eq.logical_or(&mut h.cg, &gt)?;
    let ge = h.finish(&both);
    let s = |v: &str| Value::Varchar(v.to_string());
    assert_eq!(ge.run(&[s("abc"), s("abc")])?, Value::Boolean(true));
    assert_eq!(ge.run(&[s("abd"), s("abc")])?, Value::Boolean(true));
    assert_eq!(ge.run(&[s("ab"), s("abc")])?, Value::Boolean(false));
    Ok(())
}

#[test]
fn test_test_equality() -> Result<()> {
    let mut h = Harness::new();
    let lhs = [
        h.input(SqlType::nullable(TypeId::INTEGER)),
        h.input(SqlType::nullable(TypeId::INTEGER)),
    ];
    let rhs = [
        h.input(SqlType::nullable(TypeId::INTEGER)),
        h.input(SqlType::nullable(TypeId::INTEGER)),
    ];
    let eq = TypedValue::test_equality(&mut h.cg, &lhs, &rhs)?;
    let eq = h.finish(&eq);

    assert_eq!(eq.run(&[int(1), int(2), int(1), int(2)])?, Value::Boolean(true));
    assert_eq!(eq.run(&[int(1), int(2), int(1), int(3)])?, Value::Boolean(false));
    assert_eq!(eq.run(&[int(1), int(2), int(1), Value::Null])?, Value::Null);
    // FALSE wins over NULL
    assert_eq!(eq.run(&[int(1), int(2), int(9), Value::Null])?, Value::Boolean(false));
    Ok(())
}

#[test]
fn test_test_equality_of_empty_lists_is_true() -> Result<()> {
    let mut h = Harness::new();
    let eq = TypedValue::test_equality(&mut h.cg, &[], &[])?;
    assert!(!eq.is_nullable());
    let eq = h.finish(&eq);
    assert_eq!(eq.run(&[])?, Value::Boolean(true));
    Ok(())
}

fn expected_sort(a: Option<i32>, b: Option<i32>, nulls: NullOrder) -> Ordering {
    let null_first = match nulls {
        NullOrder::First => Ordering::Less,
        NullOrder::Last => Ordering::Greater,
    };
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => null_first,
        (Some(_), None) => null_first.reverse(),
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

#[test]
fn test_compare_for_sort_is_total() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    for nulls in [NullOrder::First, NullOrder::Last] {
        let mut h = Harness::with_config(CodegenConfig::new().with_null_order(nulls));
        let a = h.input(SqlType::nullable(TypeId::INTEGER));
        let b = h.input(SqlType::nullable(TypeId::INTEGER));
        let order = a.compare_for_sort(&mut h.cg, &b)?;
        assert_eq!(order.sql_type(), SqlType::not_null(TypeId::INTEGER));
        let order = h.finish(&order);

        let mut sample = || {
            if rng.gen_bool(0.25) {
                None
            } else {
                Some(rng.gen_range(-3..4))
            }
        };
        for _ in 0..200 {
            let (x, y) = (sample(), sample());
            let value = |v: Option<i32>| v.map(Value::Integer).unwrap_or(Value::Null);
            let forward = match order.run(&[value(x), value(y)])? {
                Value::Integer(o) => o.cmp(&0),
                other => bail!("unexpected {:?}", other),
            };
            let backward = match order.run(&[value(y), value(x)])? {
                Value::Integer(o) => o.cmp(&0),
                other => bail!("unexpected {:?}", other),
            };
            assert_eq!(forward, expected_sort(x, y, nulls), "{:?} vs {:?}", x, y);
            assert_eq!(forward, backward.reverse());
        }
    }
    Ok(())
}

/// Sort-compare and `=` compiled over the same pair of input types
struct SortAndEquality {
    sort: Compiled,
    eq: Compiled,
}

impl SortAndEquality {
    fn compile(left: SqlType, right: SqlType) -> Result<Self> {
        let mut h = Harness::new();
        let a = h.input(left);
        let b = h.input(right);
        let order = a.compare_for_sort(&mut h.cg, &b)?;
        let sort = h.finish(&order);

        let mut h = Harness::new();
        let a = h.input(left);
        let b = h.input(right);
        let eq = a.compare_eq(&mut h.cg, &b)?;
        let eq = h.finish(&eq);
        Ok(Self { sort, eq })
    }

    fn order(&self, x: &Value, y: &Value) -> Result<Ordering> {
        match self.sort.run(&[x.clone(), y.clone()])? {
            Value::Integer(o) => Ok(o.cmp(&0)),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn equal(&self, x: &Value, y: &Value) -> Result<Option<bool>> {
        match self.eq.run(&[x.clone(), y.clone()])? {
            Value::Boolean(b) => Ok(Some(b)),
            Value::Null => Ok(None),
            other => bail!("unexpected {:?}", other),
        }
    }
}

/// Non-null and not NaN, so `=` has a definite answer
fn ordinary(v: &Value) -> bool {
    !matches!(v, Value::Null) && !matches!(v, Value::Decimal(d) if d.is_nan())
}

fn assert_total_order(check: &SortAndEquality, pool: &[Value], rng: &mut StdRng) -> Result<()> {
    let pick = |rng: &mut StdRng| pool[rng.gen_range(0..pool.len())].clone();
    for _ in 0..300 {
        let (a, b, c) = (pick(rng), pick(rng), pick(rng));
        let ab = check.order(&a, &b)?;
        let bc = check.order(&b, &c)?;
        let ac = check.order(&a, &c)?;
        assert_eq!(ab, check.order(&b, &a)?.reverse(), "{:?} vs {:?}", a, b);
        if ab != Ordering::Greater && bc != Ordering::Greater {
            assert_ne!(ac, Ordering::Greater, "{:?} <= {:?} <= {:?}", a, b, c);
        }
        if ab == Ordering::Equal && bc == Ordering::Equal {
            assert_eq!(ac, Ordering::Equal, "{:?} = {:?} = {:?}", a, b, c);
        }
        if ordinary(&a) && ordinary(&b) {
            assert_eq!(
                ab == Ordering::Equal,
                check.equal(&a, &b)? == Some(true),
                "{:?} vs {:?}",
                a,
                b
            );
        }
    }
    Ok(())
}

#[test]
fn test_decimal_sort_order_is_total_and_matches_equality() -> Result<()> {
    let check = SortAndEquality::compile(
        SqlType::nullable(TypeId::DECIMAL),
        SqlType::nullable(TypeId::DECIMAL),
    )?;
    let pool = [
        Value::Null,
        Value::Decimal(-0.0),
        Value::Decimal(0.0),
        Value::Decimal(1.5),
        Value::Decimal(-2.25),
        Value::Decimal(3.0),
        Value::Decimal(f64::INFINITY),
        Value::Decimal(f64::NEG_INFINITY),
        Value::Decimal(f64::NAN),
        Value::Decimal(-f64::NAN),
    ];
    assert_total_order(&check, &pool, &mut StdRng::seed_from_u64(7))
}

#[test]
fn test_varchar_sort_order_is_total_and_matches_equality() -> Result<()> {
    let check = SortAndEquality::compile(
        SqlType::nullable(TypeId::VARCHAR),
        SqlType::nullable(TypeId::VARCHAR),
    )?;
    let pool: Vec<Value> = ["", "a", "ab", "abc", "b", "B"]
        .iter()
        .map(|s| Value::Varchar(s.to_string()))
        .chain([Value::Null])
        .collect();
    assert_total_order(&check, &pool, &mut StdRng::seed_from_u64(11))
}

#[test]
fn test_mixed_integer_decimal_sort_order() -> Result<()> {
    let int_first = SortAndEquality::compile(
        SqlType::nullable(TypeId::INTEGER),
        SqlType::nullable(TypeId::DECIMAL),
    )?;
    let decimal_first = SortAndEquality::compile(
        SqlType::nullable(TypeId::DECIMAL),
        SqlType::nullable(TypeId::INTEGER),
    )?;
    let ints = [Value::Null, int(-2), int(0), int(1), int(3)];
    let decimals = [
        Value::Null,
        Value::Decimal(-0.0),
        Value::Decimal(0.0),
        Value::Decimal(1.0),
        Value::Decimal(1.5),
        Value::Decimal(-2.0),
        Value::Decimal(f64::NAN),
    ];
    for i in &ints {
        for d in &decimals {
            let forward = int_first.order(i, d)?;
            assert_eq!(forward, decimal_first.order(d, i)?.reverse(), "{:?} vs {:?}", i, d);
            if let (Value::Integer(x), Value::Decimal(y)) = (i, d) {
                if !y.is_nan() {
                    let expected = f64::from(*x).partial_cmp(y).unwrap();
                    assert_eq!(forward, expected, "{:?} vs {:?}", i, d);
                    assert_eq!(int_first.equal(i, d)?, Some(expected == Ordering::Equal));
                } else {
                    assert_eq!(forward, Ordering::Less);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_decimal_sort_agrees_with_equality() -> Result<()> {
    let check = SortAndEquality::compile(
        SqlType::not_null(TypeId::DECIMAL),
        SqlType::not_null(TypeId::DECIMAL),
    )?;
    let d = Value::Decimal;

    assert_eq!(check.order(&d(-0.0), &d(0.0))?, Ordering::Equal);
    assert_eq!(check.equal(&d(-0.0), &d(0.0))?, Some(true));

    // NaN sorts as one value above every number, yet is never `=` itself
    assert_eq!(check.order(&d(f64::NAN), &d(f64::NAN))?, Ordering::Equal);
    assert_eq!(check.order(&d(f64::NAN), &d(-f64::NAN))?, Ordering::Equal);
    assert_eq!(check.order(&d(f64::NAN), &d(f64::INFINITY))?, Ordering::Greater);
    assert_eq!(check.equal(&d(f64::NAN), &d(f64::NAN))?, Some(false));
    Ok(())
}

#[test]
fn test_min_max_with_nan_ignore_operand_order() -> Result<()> {
    let compile = |max: bool| -> Result<Compiled> {
        let mut h = Harness::new();
        let a = h.input(SqlType::not_null(TypeId::DECIMAL));
        let b = h.input(SqlType::not_null(TypeId::DECIMAL));
        let picked = if max { a.max(&mut h.cg, &b)? } else { a.min(&mut h.cg, &b)? };
        Ok(h.finish(&picked))
    };
    let (min, max) = (compile(false)?, compile(true)?);
    let nan = Value::Decimal(f64::NAN);
    let one = Value::Decimal(1.0);

    assert_eq!(min.run(&[nan.clone(), one.clone()])?, one);
    assert_eq!(min.run(&[one.clone(), nan.clone()])?, one);
    assert!(matches!(max.run(&[nan.clone(), one.clone()])?, Value::Decimal(v) if v.is_nan()));
    assert!(matches!(max.run(&[one, nan])?, Value::Decimal(v) if v.is_nan()));
    Ok(())
}

#[test]
fn test_min_max_null_policies() -> Result<()> {
    for policy in [MinMaxNulls::Propagate, MinMaxNulls::IgnoreNull] {
        let mut h = Harness::with_config(CodegenConfig::new().with_min_max_nulls(policy));
        let a = h.input(SqlType::nullable(TypeId::INTEGER));
        let b = h.input(SqlType::nullable(TypeId::INTEGER));
        let min = a.min(&mut h.cg, &b)?;
        let min = h.finish(&min);

        let mut h = Harness::with_config(CodegenConfig::new().with_min_max_nulls(policy));
        let a = h.input(SqlType::nullable(TypeId::INTEGER));
        let b = h.input(SqlType::nullable(TypeId::INTEGER));
        let max = a.max(&mut h.cg, &b)?;
        let max = h.finish(&max);

        assert_eq!(min.run(&[int(3), int(5)])?, int(3));
        assert_eq!(max.run(&[int(3), int(5)])?, int(5));
        assert_eq!(min.run(&[Value::Null, Value::Null])?, Value::Null);

        let with_null = min.run(&[Value::Null, int(5)])?;
        let with_null_max = max.run(&[int(3), Value::Null])?;
        match policy {
            MinMaxNulls::Propagate => {
                assert_eq!(with_null, Value::Null);
                assert_eq!(with_null_max, Value::Null);
            }
            MinMaxNulls::IgnoreNull => {
                assert_eq!(with_null, int(5));
                assert_eq!(with_null_max, int(3));
            }
        }
    }
    Ok(())
}

#[test]
fn test_min_of_varchar_keeps_length() -> Result<()> {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::VARCHAR));
    let b = h.input(SqlType::not_null(TypeId::VARCHAR));
    let min = a.min(&mut h.cg, &b)?;
    let min = h.finish(&min);
    let s = |v: &str| Value::Varchar(v.to_string());
    assert_eq!(min.run(&[s("pear"), s("apple")])?, s("apple"));
    Ok(())
}

#[test]
fn test_build_phi_follows_taken_branch() -> Result<()> {
    let mut h = Harness::new();
    let cond = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let then_block = h.cg.create_block("then");
    let else_block = h.cg.create_block("else");
    let merge = h.cg.create_block("merge");
    let flag = cond.value().unwrap();
    h.cg.cond_br(flag, then_block, else_block)?;

    h.cg.position_at_end(then_block);
    let five = TypedValue::constant(&mut h.cg, &int(5))?;
    h.cg.br(merge)?;

    h.cg.position_at_end(else_block);
    let null = TypedValue::null(&mut h.cg, TypeId::INTEGER)?;
    h.cg.br(merge)?;

    h.cg.position_at_end(merge);
    let merged = TypedValue::build_phi(&mut h.cg, &[(five, then_block), (null, else_block)])?;
    assert_eq!(merged.sql_type(), SqlType::nullable(TypeId::INTEGER));
    let merged = h.finish(&merged);

    assert_eq!(merged.run(&[Value::Boolean(true)])?, int(5));
    assert_eq!(merged.run(&[Value::Boolean(false)])?, Value::Null);
    Ok(())
}

#[test]
fn test_build_phi_merges_lengths() -> Result<()> {
    let mut h = Harness::new();
    let cond = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let then_block = h.cg.create_block("then");
    let else_block = h.cg.create_block("else");
    let merge = h.cg.create_block("merge");
    h.cg.cond_br(cond.value().unwrap(), then_block, else_block)?;

    h.cg.position_at_end(then_block);
    let short = TypedValue::constant(&mut h.cg, &Value::Varchar("ab".to_string()))?;
    h.cg.br(merge)?;

    h.cg.position_at_end(else_block);
    let long = TypedValue::constant(&mut h.cg, &Value::Varchar("abcdef".to_string()))?;
    h.cg.br(merge)?;

    h.cg.position_at_end(merge);
    let merged = TypedValue::build_phi(&mut h.cg, &[(short, then_block), (long, else_block)])?;
    assert!(!merged.is_nullable());
    let merged = h.finish(&merged);

    assert_eq!(merged.run(&[Value::Boolean(true)])?, Value::Varchar("ab".to_string()));
    assert_eq!(merged.run(&[Value::Boolean(false)])?, Value::Varchar("abcdef".to_string()));
    Ok(())
}

/// |a - b| registered as a named operator on INTEGER
struct AbsDiff;

impl BinaryOp for AbsDiff {
    fn emit(&self, cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> CodegenResult<OpOutput> {
        let missing = || CodegenError::InvalidValue("missing register".to_string());
        let (l, r) = (left.value().ok_or_else(missing)?, right.value().ok_or_else(missing)?);
        let (forward, forward_overflow) = cg.checked_arith(vibedb_codegen::codegen::ir::ArithOp::Sub, l, r);
        let (backward, backward_overflow) = cg.checked_arith(vibedb_codegen::codegen::ir::ArithOp::Sub, r, l);
        let left_bigger = cg.cmp(vibedb_codegen::codegen::ir::CmpPred::Gt, l, r);
        let value = cg.select(left_bigger, forward, backward);
        let overflow = cg.select(left_bigger, forward_overflow, backward_overflow);
        Ok(OpOutput::new(value).with_fault(overflow, ArithFault::Overflow))
    }
}

#[test]
fn test_named_operator_from_registry() -> Result<()> {
    let registry = TypeRegistry::with_builtins();
    let abs_diff = OperatorId::Named("abs_diff");
    registry.register_binary(abs_diff, TypeId::INTEGER, TypeId::INTEGER, TypeId::INTEGER, Arc::new(AbsDiff));

    let mut h = Harness::with_registry(Arc::new(registry), CodegenConfig::default());
    let a = h.input(SqlType::nullable(TypeId::SMALLINT));
    let b = h.input(SqlType::not_null(TypeId::INTEGER));
    let diff = a.call_binary(&mut h.cg, abs_diff, &b, OnError::Exception)?;
    assert_eq!(diff.sql_type(), SqlType::nullable(TypeId::INTEGER));
    let diff = h.finish(&diff);

    assert_eq!(diff.run(&[Value::SmallInt(3), int(10)])?, int(7));
    assert_eq!(diff.run(&[Value::SmallInt(10), int(3)])?, int(7));
    assert_eq!(diff.run(&[Value::Null, int(3)])?, Value::Null);
    Ok(())
}

#[test]
fn test_unregistered_operator_fails_at_generation() {
    let mut h = Harness::new();
    let a = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let b = h.input(SqlType::not_null(TypeId::BOOLEAN));
    let err = a.add(&mut h.cg, &b, OnError::Exception).unwrap_err();
    assert_eq!(
        err,
        CodegenError::NoSuchOperator {
            operator: "+".to_string(),
            left: "Boolean".to_string(),
            right: Some("Boolean".to_string()),
        }
    );
}
