use crate::assembly::AssemblyContext;
use crate::function::{field_function_from_input, FieldFunction, MissingFunctionPolicy};
use crate::input::Input;
use crate::nalgebra::Vector3;
use crate::physics::{density_from_input, JacobianModel, Physics};
use crate::variables::{System, VelocityVariables};
use crate::Real;
use numeric_literals::replace_float_literals;
use std::fmt;

pub const AVERAGED_FAN: &str = "AveragedFan";

const SECTION: &str = "Physics/AveragedFan";

/// The moving frame of a fan blade at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct FanFrame<T: Real> {
    /// Unit vector along the blade velocity, zero if the blade is at rest.
    pub n_b: Vector3<T>,
    /// The local vertical direction, as given.
    pub n_v: Vector3<T>,
    /// $N_B \times N_V$, radial for counter-clockwise rotation.
    pub n_r: Vector3<T>,
    /// Velocity relative to the blade, projected onto the blade plane.
    pub u_p: Vector3<T>,
    /// Unit vector opposing $U_P$, zero if $U_P$ vanishes.
    pub n_drag: Vector3<T>,
    /// $N_\text{drag} \times N_R$.
    pub n_lift: Vector3<T>,
    /// $\operatorname{atan2}(u_\text{up}, u_\text{fwd})$, zero if both components vanish.
    pub flow_angle: T,
}

impl<T: Real> FanFrame<T> {
    /// Builds the frame from the fluid velocity, the blade velocity and the local vertical.
    pub fn new(velocity: &Vector3<T>, base_velocity: &Vector3<T>, local_vertical: &Vector3<T>) -> Self {
        let n_b = normalize_or_zero(base_velocity);
        let n_v = *local_vertical;
        let n_r = n_b.cross(&n_v);
        let u_p = velocity - n_r * velocity.dot(&n_r) - base_velocity;
        let n_drag = -normalize_or_zero(&u_p);
        let n_lift = n_drag.cross(&n_r);

        let u_fwd = -u_p.dot(&n_b);
        let u_up = u_p.dot(&n_v);
        let flow_angle = if u_up != T::zero() || u_fwd != T::zero() {
            u_up.atan2(u_fwd)
        } else {
            T::zero()
        };

        Self {
            n_b,
            n_v,
            n_r,
            u_p,
            n_drag,
            n_lift,
            flow_angle,
        }
    }

    /// Derivative of $|U_P|^2$ with respect to velocity component `b`, holding the frame fixed.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn dv2_du(&self, b: usize) -> T {
        2.0 * (self.u_p[b] - self.n_r[b] * self.u_p.dot(&self.n_r))
    }
}

fn normalize_or_zero<T: Real>(v: &Vector3<T>) -> Vector3<T> {
    let norm = v.norm();
    if norm != T::zero() {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Body force of a rotating fan, averaged over the swept area.
///
/// At every point, lift and drag coefficients are looked up as functions of position and
/// the effective angle of attack (passed in place of time) and scaled by the dynamic
/// pressure $\frac{1}{2} \rho |U_P|^2$ times chord length over swept area. The resulting force
/// is added to the momentum equations.
///
/// The Jacobian only linearizes $|U_P|^2$. The frame vectors and the angle of attack are held
/// fixed.
pub struct AveragedFan<T: Real> {
    velocity: VelocityVariables,
    density: T,
    base_velocity: Box<dyn FieldFunction<T>>,
    local_vertical: Box<dyn FieldFunction<T>>,
    lift: Box<dyn FieldFunction<T>>,
    drag: Box<dyn FieldFunction<T>>,
    chord_length: Box<dyn FieldFunction<T>>,
    area_swept: Box<dyn FieldFunction<T>>,
    angle_of_attack: Box<dyn FieldFunction<T>>,
}

impl<T: Real> fmt::Debug for AveragedFan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AveragedFan")
            .field("density", &self.density)
            .field("base_velocity", &self.base_velocity)
            .field("local_vertical", &self.local_vertical)
            .field("lift", &self.lift)
            .field("drag", &self.drag)
            .field("chord_length", &self.chord_length)
            .field("area_swept", &self.area_swept)
            .field("angle_of_attack", &self.angle_of_attack)
            .finish_non_exhaustive()
    }
}

impl<T: Real> AveragedFan<T> {
    pub fn from_input(input: &Input) -> eyre::Result<Self> {
        input.ensure_recognized(
            SECTION,
            &[
                "base_velocity",
                "local_vertical",
                "lift",
                "drag",
                "chord_length",
                "area_swept",
                "angle_of_attack",
            ],
        )?;
        let function = |name: &str, sentinel: &str, policy, n_components| {
            field_function_from_input::<T>(
                input,
                AVERAGED_FAN,
                &format!("{SECTION}/{name}"),
                sentinel,
                policy,
                n_components,
            )
        };
        use MissingFunctionPolicy::{Fatal, ZeroWithWarning};
        Ok(Self {
            velocity: VelocityVariables::from_input(input)?,
            density: density_from_input(input, AVERAGED_FAN)?,
            base_velocity: function("base_velocity", "0", Fatal, 3)?,
            local_vertical: function("local_vertical", "0", Fatal, 3)?,
            lift: function("lift", "0", ZeroWithWarning, 1)?,
            drag: function("drag", "0", ZeroWithWarning, 1)?,
            chord_length: function("chord_length", "0", Fatal, 1)?,
            area_swept: function("area_swept", "0", Fatal, 1)?,
            angle_of_attack: function("angle_of_attack", "00000", Fatal, 1)?,
        })
    }
}

impl<T: Real> Physics<T> for AveragedFan<T> {
    fn name(&self) -> &str {
        AVERAGED_FAN
    }

    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()> {
        self.velocity.init(system);
        Ok(())
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let components = self.velocity.components();
        let fe = state.fe(self.velocity.u());
        let n = fe.n_dofs();
        let time = state.time();
        let rho = self.density;

        for qp in 0..state.n_qpoints() {
            let x = fe.xyz(qp);
            let jxw = fe.jxw(qp);

            let mut velocity = Vector3::zeros();
            for (a, &u) in components.iter().enumerate() {
                velocity[a] = state.interior_value(u, qp);
            }
            let base_velocity = self.base_velocity.evaluate_vector3(x, time)?;
            let local_vertical = self.local_vertical.evaluate_vector3(x, time)?;
            let frame = FanFrame::new(&velocity, &base_velocity, &local_vertical);

            let angle = frame.flow_angle + self.angle_of_attack.evaluate_scalar(x, time)?;
            let c_lift = self.lift.evaluate_scalar(x, angle)?;
            let c_drag = self.drag.evaluate_scalar(x, angle)?;
            let chord = self.chord_length.evaluate_scalar(x, time)?;
            let area = self.area_swept.evaluate_scalar(x, time)?;

            let v_sq = frame.u_p.norm_squared();
            let dynamic_factor = 0.5 * rho * chord / area;
            // Force per unit |U_P|^2
            let force_direction = (frame.n_lift * c_lift + frame.n_drag * c_drag) * dynamic_factor;
            let force = force_direction * v_sq;

            for (a, &u) in components.iter().enumerate() {
                for i in 0..n {
                    buffers.add_residual(u, i, force[a] * fe.phi(i, qp) * jxw);
                }
            }

            if compute_jacobian {
                let factor = jxw * state.solution_derivative();
                for (b, &u_b) in components.iter().enumerate() {
                    let dv2_du_b = frame.dv2_du(b);
                    for j in 0..n {
                        let dv2 = dv2_du_b * fe.phi(j, qp);
                        for (a, &u_a) in components.iter().enumerate() {
                            for i in 0..n {
                                let value = force_direction[a] * dv2 * fe.phi(i, qp) * factor;
                                buffers.add_jacobian(u_a, u_b, i, j, value);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        JacobianModel::Approximate("frame vectors and angle of attack are held fixed")
    }
}
