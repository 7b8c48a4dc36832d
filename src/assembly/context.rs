use crate::assembly::ElementFeValues;
use crate::error::AssemblyError;
use crate::nalgebra::{DMatrix, DMatrixView, DVector, DVectorView, Matrix3, Scalar, Vector3};
use crate::variables::VariableIndex;
use crate::Real;
use eyre::eyre;

/// Element data a physics module needs beyond values and first derivatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeRequests {
    hessians: Vec<VariableIndex>,
}

impl FeRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests second derivatives of the shape functions of the given variable.
    pub fn request_hessians(&mut self, var: VariableIndex) {
        if !self.hessians.contains(&var) {
            self.hessians.push(var);
        }
    }

    pub fn hessians(&self) -> &[VariableIndex] {
        &self.hessians
    }

    /// Merges the requests of another module into this one.
    pub fn extend(&mut self, other: &FeRequests) {
        for var in &other.hessians {
            self.request_hessians(*var);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct DofBlock {
    fe: usize,
    offset: usize,
    len: usize,
}

/// The read-only part of an [`AssemblyContext`]: element shape data, the element-local
/// solution and the time stepping coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementState<T: Scalar> {
    fe: Vec<ElementFeValues<T>>,
    blocks: Vec<DofBlock>,
    solution: DVector<T>,
    solution_rate: DVector<T>,
    time: T,
    timestep: Option<T>,
    solution_derivative: T,
    solution_rate_derivative: T,
}

/// The accumulation buffers of an [`AssemblyContext`].
///
/// The residual and Jacobian are laid out variable by variable, in the order of the
/// variable indices, with the degrees of freedom of each variable stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBuffers<T: Scalar> {
    blocks: Vec<DofBlock>,
    residual: DVector<T>,
    jacobian: DMatrix<T>,
}

/// Everything a physics module sees of one element during assembly.
///
/// Contexts are independent of each other, so a host may assemble different elements on
/// different threads, each with its own context.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyContext<T: Scalar> {
    state: ElementState<T>,
    buffers: ElementBuffers<T>,
}

impl<T: Real> AssemblyContext<T> {
    /// Creates a context for an element.
    ///
    /// `variable_fe[v]` names the entry of `fe` that discretizes the variable with index `v`.
    /// The length of `solution` must equal the total number of element degrees of freedom.
    /// The solution rate starts out as zero, the problem is steady and the solution derivative
    /// factors are one.
    pub fn new(fe: Vec<ElementFeValues<T>>, variable_fe: &[usize], solution: DVector<T>) -> eyre::Result<Self> {
        let mut blocks = Vec::with_capacity(variable_fe.len());
        let mut offset = 0;
        for (var, &fe_index) in variable_fe.iter().enumerate() {
            let values = fe
                .get(fe_index)
                .ok_or_else(|| eyre!("variable {var} refers to missing finite element {fe_index}"))?;
            if let Some(first) = fe.first() {
                if values.n_qpoints() != first.n_qpoints() {
                    return Err(eyre!("all finite elements must share the same quadrature rule"));
                }
            }
            blocks.push(DofBlock {
                fe: fe_index,
                offset,
                len: values.n_dofs(),
            });
            offset += values.n_dofs();
        }

        if solution.len() != offset {
            return Err(eyre!(
                "element has {offset} degrees of freedom, but solution has length {}",
                solution.len()
            ));
        }

        Ok(Self {
            state: ElementState {
                fe,
                blocks: blocks.clone(),
                solution_rate: DVector::zeros(offset),
                solution,
                time: T::zero(),
                timestep: None,
                solution_derivative: T::one(),
                solution_rate_derivative: T::one(),
            },
            buffers: ElementBuffers {
                blocks,
                residual: DVector::zeros(offset),
                jacobian: DMatrix::zeros(offset, offset),
            },
        })
    }

    pub fn with_solution_rate(mut self, rate: DVector<T>) -> eyre::Result<Self> {
        self.set_solution_rate(rate)?;
        Ok(self)
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.state.time = time;
        self
    }

    /// Marks the problem as unsteady with the given time step.
    pub fn with_timestep(mut self, dt: T) -> Self {
        self.state.timestep = Some(dt);
        self
    }

    /// Sets $\partial U / \partial \text{solution}$ and $\partial \dot U / \partial \text{solution}$,
    /// the factors the time integrator applies to Jacobian contributions.
    pub fn with_solution_derivatives(mut self, solution_derivative: T, solution_rate_derivative: T) -> Self {
        self.state.solution_derivative = solution_derivative;
        self.state.solution_rate_derivative = solution_rate_derivative;
        self
    }

    pub fn set_solution(&mut self, solution: DVector<T>) -> eyre::Result<()> {
        if solution.len() != self.state.solution.len() {
            return Err(eyre!("solution length does not match element degrees of freedom"));
        }
        self.state.solution = solution;
        Ok(())
    }

    pub fn set_solution_rate(&mut self, rate: DVector<T>) -> eyre::Result<()> {
        if rate.len() != self.state.solution.len() {
            return Err(eyre!("solution rate length does not match element degrees of freedom"));
        }
        self.state.solution_rate = rate;
        Ok(())
    }

    pub fn state(&self) -> &ElementState<T> {
        &self.state
    }

    pub fn buffers(&self) -> &ElementBuffers<T> {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut ElementBuffers<T> {
        &mut self.buffers
    }

    /// Borrows the state immutably and the buffers mutably at the same time.
    pub fn split_mut(&mut self) -> (&ElementState<T>, &mut ElementBuffers<T>) {
        (&self.state, &mut self.buffers)
    }

    /// Checks that the element provides the data a module requested.
    pub fn validate_requests(&self, requests: &FeRequests, module: &str) -> Result<(), AssemblyError> {
        for &var in requests.hessians() {
            let available = self
                .state
                .blocks
                .get(var.index())
                .map(|block| self.state.fe[block.fe].has_hessians())
                .unwrap_or(false);
            if !available {
                return Err(AssemblyError::MissingElementData {
                    module: module.to_string(),
                    data: format!("second derivatives for variable {}", var.index()),
                });
            }
        }
        Ok(())
    }
}

impl<T: Real> ElementState<T> {
    pub fn fe(&self, var: VariableIndex) -> &ElementFeValues<T> {
        &self.fe[self.blocks[var.index()].fe]
    }

    pub fn n_dofs(&self, var: VariableIndex) -> usize {
        self.blocks[var.index()].len
    }

    pub fn n_total_dofs(&self) -> usize {
        self.solution.len()
    }

    /// The number of quadrature points, shared by all variables.
    pub fn n_qpoints(&self) -> usize {
        self.fe.first().map(ElementFeValues::n_qpoints).unwrap_or(0)
    }

    pub fn solution(&self) -> &DVector<T> {
        &self.solution
    }

    pub fn solution_rate(&self) -> &DVector<T> {
        &self.solution_rate
    }

    pub fn element_solution(&self, var: VariableIndex) -> DVectorView<'_, T> {
        let block = self.blocks[var.index()];
        self.solution.rows(block.offset, block.len)
    }

    pub fn element_solution_rate(&self, var: VariableIndex) -> DVectorView<'_, T> {
        let block = self.blocks[var.index()];
        self.solution_rate.rows(block.offset, block.len)
    }

    pub fn interior_value(&self, var: VariableIndex, qp: usize) -> T {
        let fe = self.fe(var);
        self.element_solution(var)
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (i, u_i)| acc + *u_i * fe.phi(i, qp))
    }

    pub fn interior_gradient(&self, var: VariableIndex, qp: usize) -> Vector3<T> {
        let fe = self.fe(var);
        self.element_solution(var)
            .iter()
            .enumerate()
            .fold(Vector3::zeros(), |acc, (i, u_i)| acc + fe.dphi(i, qp) * *u_i)
    }

    /// Physical second derivatives, zero if the element does not provide them.
    pub fn interior_hessian(&self, var: VariableIndex, qp: usize) -> Matrix3<T> {
        let fe = self.fe(var);
        self.element_solution(var)
            .iter()
            .enumerate()
            .fold(Matrix3::zeros(), |acc, (i, u_i)| acc + fe.d2phi(i, qp) * *u_i)
    }

    /// The gradient of the variable with respect to reference coordinates.
    pub fn interior_reference_gradient(&self, var: VariableIndex, qp: usize) -> Vector3<T> {
        let fe = self.fe(var);
        self.element_solution(var)
            .iter()
            .enumerate()
            .fold(Vector3::zeros(), |acc, (i, u_i)| acc + fe.reference_dphi(i, qp) * *u_i)
    }

    pub fn interior_rate(&self, var: VariableIndex, qp: usize) -> T {
        let fe = self.fe(var);
        self.element_solution_rate(var)
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (i, u_i)| acc + *u_i * fe.phi(i, qp))
    }

    pub fn time(&self) -> T {
        self.time
    }

    /// The time step, or `None` for a steady problem.
    pub fn timestep(&self) -> Option<T> {
        self.timestep
    }

    pub fn is_steady(&self) -> bool {
        self.timestep.is_none()
    }

    pub fn solution_derivative(&self) -> T {
        self.solution_derivative
    }

    pub fn solution_rate_derivative(&self) -> T {
        self.solution_rate_derivative
    }
}

impl<T: Real> ElementBuffers<T> {
    pub fn add_residual(&mut self, var: VariableIndex, i: usize, value: T) {
        let block = self.blocks[var.index()];
        debug_assert!(i < block.len);
        self.residual[block.offset + i] += value;
    }

    pub fn add_jacobian(&mut self, row_var: VariableIndex, col_var: VariableIndex, i: usize, j: usize, value: T) {
        let rows = self.blocks[row_var.index()];
        let cols = self.blocks[col_var.index()];
        debug_assert!(i < rows.len && j < cols.len);
        self.jacobian[(rows.offset + i, cols.offset + j)] += value;
    }

    pub fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    pub fn residual_block(&self, var: VariableIndex) -> DVectorView<'_, T> {
        let block = self.blocks[var.index()];
        self.residual.rows(block.offset, block.len)
    }

    pub fn jacobian_block(&self, row_var: VariableIndex, col_var: VariableIndex) -> DMatrixView<'_, T> {
        let rows = self.blocks[row_var.index()];
        let cols = self.blocks[col_var.index()];
        self.jacobian
            .view((rows.offset, cols.offset), (rows.len, cols.len))
    }

    /// Resets residual and Jacobian to zero.
    pub fn clear(&mut self) {
        self.residual.fill(T::zero());
        self.jacobian.fill(T::zero());
    }
}
