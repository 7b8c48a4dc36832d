//! Closure functions of the Spalart-Allmaras one-equation turbulence model.
//!
//! The functions here are pure: they never fail and never reject their input. The working
//! variable $\nu$ may be negative during Newton iterations. Blow-up of the destruction ratio
//! $r$ near walls or for vanishing $\tilde S$ is handled by limiting $r$ to $r_\text{lin}$.
//!
//! Every closure returns its value together with the analytic partial derivatives needed for
//! exact Newton linearization.
use crate::error::ConfigurationError;
use crate::input::Input;
use crate::nalgebra::{convert, Matrix3, Vector3};
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Model constants of the Spalart-Allmaras closure.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpalartAllmarasParameters<T> {
    pub cb1: T,
    pub sigma: T,
    pub cb2: T,
    pub kappa: T,
    pub cv1: T,
    pub cv2: T,
    pub cv3: T,
    pub r_lin: T,
    pub c_w2: T,
    pub c_w3: T,
}

impl<T: Real> Default for SpalartAllmarasParameters<T> {
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn default() -> Self {
        Self {
            cb1: 0.1355,
            sigma: 2.0 / 3.0,
            cb2: 0.622,
            kappa: 0.41,
            cv1: 7.1,
            cv2: 0.7,
            cv3: 0.9,
            r_lin: 10.0,
            c_w2: 0.3,
            c_w3: 2.0,
        }
    }
}

impl<T: Real> SpalartAllmarasParameters<T> {
    /// The destruction coefficient $c_{w1} = c_{b1} / \kappa^2 + (1 + c_{b2}) / \sigma$.
    pub fn cw1(&self) -> T {
        self.cb1 / (self.kappa * self.kappa) + (T::one() + self.cb2) / self.sigma
    }

    /// Reads the constants from `Physics/SpalartAllmaras`, keeping defaults for absent keys.
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        let module = "SpalartAllmaras";
        let mut params = Self::default();
        let fields: [(&str, &mut T); 10] = [
            ("cb1", &mut params.cb1),
            ("sigma", &mut params.sigma),
            ("cb2", &mut params.cb2),
            ("kappa", &mut params.kappa),
            ("cv1", &mut params.cv1),
            ("cv2", &mut params.cv2),
            ("cv3", &mut params.cv3),
            ("r_lin", &mut params.r_lin),
            ("c_w2", &mut params.c_w2),
            ("c_w3", &mut params.c_w3),
        ];
        for (name, field) in fields {
            let key = format!("Physics/SpalartAllmaras/{name}");
            if let Some(value) = input.number(module, &key)? {
                *field = convert(value);
            }
        }
        Ok(params)
    }
}

/// The viscous damping function $f_{v1} = \chi^3 / (\chi^3 + c_{v1}^3)$ and its derivative
/// with respect to $\chi$.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn fv1<T: Real>(params: &SpalartAllmarasParameters<T>, chi: T) -> (T, T) {
    let chi3 = chi.powi(3);
    let cv13 = params.cv1.powi(3);
    let denom = chi3 + cv13;
    let value = chi3 / denom;
    let derivative = 3.0 * chi * chi * cv13 / (denom * denom);
    (value, derivative)
}

/// The function $f_{v2} = 1 - \chi / (1 + \chi f_{v1})$ and its derivative with respect to $\chi$.
pub fn fv2<T: Real>(params: &SpalartAllmarasParameters<T>, chi: T) -> (T, T) {
    let (fv1, dfv1) = fv1(params, chi);
    let denom = T::one() + chi * fv1;
    let value = T::one() - chi / denom;
    let derivative = -(T::one() - chi * chi * dfv1) / (denom * denom);
    (value, derivative)
}

/// The modified vorticity $\tilde S$ and its partial derivatives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModifiedVorticity<T> {
    pub s_tilde: T,
    pub ds_dnu: T,
    pub ds_dvorticity: T,
}

/// Evaluates the source function $\tilde S(\nu, d)$ at vorticity magnitude $\Omega$.
///
/// With $\bar S = \nu f_{v2}(\chi) / (\kappa^2 d^2)$, the modified vorticity is $\Omega + \bar S$
/// if $\bar S \geq -c_{v2} \Omega$, and
/// <div>$$
/// \Omega + \frac{\Omega (c_{v2}^2 \Omega + c_{v3} \bar S)}{(c_{v3} - 2 c_{v2}) \Omega - \bar S}
/// $$</div>
/// otherwise, which keeps $\tilde S$ positive for negative $\bar S$.
///
/// `nu_molecular` is the molecular kinematic viscosity $\mu / \rho$ defining $\chi = \nu / \nu_\text{mol}$.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn source_function<T: Real>(
    params: &SpalartAllmarasParameters<T>,
    nu: T,
    nu_molecular: T,
    wall_distance: T,
    vorticity: T,
) -> ModifiedVorticity<T> {
    let chi = nu / nu_molecular;
    let (fv2, dfv2_dchi) = fv2(params, chi);
    let kd2 = (params.kappa * wall_distance).powi(2);
    let s_bar = nu * fv2 / kd2;
    // d(chi)/d(nu) = 1 / nu_molecular, so nu * dfv2/dnu = chi * dfv2/dchi
    let ds_bar_dnu = (fv2 + chi * dfv2_dchi) / kd2;

    let (cv2, cv3) = (params.cv2, params.cv3);
    if s_bar >= -cv2 * vorticity {
        ModifiedVorticity {
            s_tilde: vorticity + s_bar,
            ds_dnu: ds_bar_dnu,
            ds_dvorticity: 1.0,
        }
    } else {
        let omega = vorticity;
        let numer = omega * (cv2 * cv2 * omega + cv3 * s_bar);
        let denom = (cv3 - 2.0 * cv2) * omega - s_bar;
        let ds_ds_bar = (omega * cv3 * denom + numer) / (denom * denom);
        let ds_domega =
            1.0 + ((2.0 * cv2 * cv2 * omega + cv3 * s_bar) * denom - numer * (cv3 - 2.0 * cv2)) / (denom * denom);
        ModifiedVorticity {
            s_tilde: omega + numer / denom,
            ds_dnu: ds_ds_bar * ds_bar_dnu,
            ds_dvorticity: ds_domega,
        }
    }
}

/// The destruction function $f_w$ and its partial derivatives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WallDestruction<T> {
    pub fw: T,
    pub dfw_dnu: T,
    pub dfw_ds_tilde: T,
}

/// Evaluates the destruction function $f_w(\nu, d, \tilde S)$.
///
/// The ratio $r = \nu / (\tilde S \kappa^2 d^2)$ is replaced by $r_\text{lin}$ when it is at
/// least $r_\text{lin}$, not finite, or when its denominator vanishes. Negative ratios (from a
/// negative working variable) are limited to $-r_\text{lin}$, which keeps $g^6$ finite. The
/// limited ratio is constant, so its derivatives are zero there.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn destruction_function<T: Real>(
    params: &SpalartAllmarasParameters<T>,
    nu: T,
    wall_distance: T,
    s_tilde: T,
) -> WallDestruction<T> {
    let denom = s_tilde * (params.kappa * wall_distance).powi(2);
    let (r, dr_dnu, dr_ds) = if denom == T::zero() {
        (params.r_lin, 0.0, 0.0)
    } else {
        let r = nu / denom;
        if !r.is_finite() || r >= params.r_lin {
            (params.r_lin, 0.0, 0.0)
        } else if r <= -params.r_lin {
            (-params.r_lin, 0.0, 0.0)
        } else {
            (r, 1.0 / denom, -r / s_tilde)
        }
    };

    let c_w2 = params.c_w2;
    let c6 = params.c_w3.powi(6);
    let g = r + c_w2 * (r.powi(6) - r);
    let dg_dr = 1.0 + c_w2 * (6.0 * r.powi(5) - 1.0);
    let g6 = g.powi(6);
    let a = ((1.0 + c6) / (g6 + c6)).powf(1.0 / 6.0);
    let fw = g * a;
    let dfw_dg = a * c6 / (g6 + c6);

    WallDestruction {
        fw,
        dfw_dnu: dfw_dg * dg_dr * dr_dnu,
        dfw_ds_tilde: dfw_dg * dg_dr * dr_ds,
    }
}

/// The vorticity vector $\nabla \times \vec u$.
///
/// `velocity_gradient[(a, j)]` holds $\partial u_a / \partial x_j$. In two dimensions, the
/// third row and column are zero and only the $z$-component survives.
pub fn vorticity<T: Real>(velocity_gradient: &Matrix3<T>) -> Vector3<T> {
    let g = velocity_gradient;
    Vector3::new(
        g[(2, 1)] - g[(1, 2)],
        g[(0, 2)] - g[(2, 0)],
        g[(1, 0)] - g[(0, 1)],
    )
}

/// The vorticity magnitude $\Omega = |\nabla \times \vec u|$.
pub fn vorticity_magnitude<T: Real>(velocity_gradient: &Matrix3<T>) -> T {
    vorticity(velocity_gradient).norm()
}

/// Derivative of $\Omega$ with respect to the coefficient of the shape function with gradient
/// `dphi` in velocity component `component`.
///
/// The derivative is taken as zero where $\Omega$ vanishes.
pub fn vorticity_magnitude_derivative<T: Real>(
    velocity_gradient: &Matrix3<T>,
    component: usize,
    dphi: &Vector3<T>,
) -> T {
    let omega = vorticity(velocity_gradient);
    let magnitude = omega.norm();
    if magnitude == T::zero() {
        return T::zero();
    }
    // curl(phi e_a) = grad(phi) x e_a
    let mut e_a = Vector3::zeros();
    e_a[component] = T::one();
    omega.dot(&dphi.cross(&e_a)) / magnitude
}
