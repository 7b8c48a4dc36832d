use fenris_physics::error::ConfigurationError;
use fenris_physics::function::{
    field_function_from_input, ConstantFunction, FieldFunction, FnFieldFunction, MissingFunctionPolicy, ParsedFunction,
};
use fenris_physics::input::Input;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};

#[test]
fn parsed_function_depends_on_space_and_time() {
    let function = ParsedFunction::parse("x * y + t").unwrap();
    let value: f64 = function
        .evaluate_scalar(&Point3::new(2.0, 3.0, 0.0), 0.5)
        .unwrap();
    assert_scalar_eq!(value, 6.5, comp = float);
}

#[test]
fn parsed_vector_function_components() {
    let function = ParsedFunction::parse("-y{}x{}math::sin(pi * z)").unwrap();
    assert_eq!(FieldFunction::<f64>::n_components(&function), 3);
    let value: Vector3<f64> = function
        .evaluate_vector3(&Point3::new(1.0, 2.0, 0.5), 0.0)
        .unwrap();
    assert_eq!(value.x, -2.0);
    assert_eq!(value.y, 1.0);
    assert_scalar_eq!(value.z, 1.0, comp = abs, tol = 1e-15);
}

#[test]
fn missing_components_are_zero() {
    let constant = ConstantFunction::new(vec![1.0, 2.0]);
    let value = constant
        .evaluate_vector3(&Point3::origin(), 0.0)
        .unwrap();
    assert_eq!(value, Vector3::new(1.0, 2.0, 0.0));

    let parsed = ParsedFunction::parse("1.5{}2.5").unwrap();
    let value: Vector3<f64> = parsed.evaluate_vector3(&Point3::origin(), 0.0).unwrap();
    assert_eq!(value, Vector3::new(1.5, 2.5, 0.0));
}

#[test]
fn closures_are_field_functions() {
    let function = FnFieldFunction::new(1, |x: &Point3<f64>, t: f64, out: &mut [f64]| out[0] = x.z + t);
    assert_eq!(function.evaluate_scalar(&Point3::new(0.0, 0.0, 1.0), 2.0).unwrap(), 3.0);
}

#[test]
fn malformed_expressions_fail_to_parse() {
    assert!(ParsedFunction::parse("x * (y + ").is_err());
}

#[test]
fn function_inputs_follow_missing_policy() {
    let module = "Test";
    let key = "Physics/Test/f";
    let fatal = MissingFunctionPolicy::Fatal;
    let zero = MissingFunctionPolicy::ZeroWithWarning;

    let absent = Input::new();
    let err = field_function_from_input::<f64>(&absent, module, key, "0", fatal, 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::MissingKey { .. })
    ));

    let sentinel = Input::new().with(key, "0");
    let err = field_function_from_input::<f64>(&sentinel, module, key, "0", fatal, 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::SentinelValue { .. })
    ));

    // A number equal to the sentinel is the sentinel
    let numeric_sentinel = Input::new().with(key, 0.0);
    assert!(field_function_from_input::<f64>(&numeric_sentinel, module, key, "0", fatal, 1).is_err());

    for input in [&absent, &sentinel] {
        let function = field_function_from_input::<f64>(input, module, key, "0", zero, 3).unwrap();
        let value = function
            .evaluate_vector3(&Point3::new(1.0, 2.0, 3.0), 1.0)
            .unwrap();
        assert_eq!(value, Vector3::zeros());
    }

    let given = Input::new().with(key, "2 * x");
    let function = field_function_from_input::<f64>(&given, module, key, "0", fatal, 1).unwrap();
    assert_eq!(function.evaluate_scalar(&Point3::new(1.5, 0.0, 0.0), 0.0).unwrap(), 3.0);
}

#[test]
fn unknown_variables_are_reported_at_construction() {
    let input = Input::new().with("Physics/Test/f", "x + q");
    let err = field_function_from_input::<f64>(&input, "Test", "Physics/Test/f", "0", MissingFunctionPolicy::Fatal, 1)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::InvalidValue { .. })
    ));
}
