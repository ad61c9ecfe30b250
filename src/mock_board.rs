//! We use this mocking module in unit tests to emulate the analog pins and timer of a board.

use std::{cell::Cell, rc::Rc};

use crate::analog::{AnalogInput, AnalogOutput};

/// Mock DAC pin. Clones share the same code, so a test can keep a handle to inspect it.
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    code: Rc<Cell<u16>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// The code this pin was last driven to.
    pub fn code(&self) -> u16 {
        self.code.get()
    }
}

impl AnalogOutput for MockOutput {
    fn set_code(&mut self, code: u16) {
        self.code.set(code);
    }
}

/// Where a [MockInput] gets its readings from.
#[derive(Debug)]
enum Source {
    /// Always reads the same code.
    Fixed(u16),
    /// Reads whatever an output is driving, plus a constant bias.
    Follow { code: Rc<Cell<u16>>, bias: i32 },
    /// Cycles through a list of codes.
    Sequence { codes: Vec<u16>, next: usize },
}

/// Mock ADC pin.
#[derive(Debug)]
pub struct MockInput {
    source: Source,
}

impl MockInput {
    pub fn fixed(code: u16) -> Self {
        Self {
            source: Source::Fixed(code),
        }
    }

    /// An input wired straight to `output`, reading `bias` codes high.
    pub fn follow(output: &MockOutput, bias: i32) -> Self {
        Self {
            source: Source::Follow {
                code: output.code.clone(),
                bias,
            },
        }
    }

    pub fn sequence(codes: &[u16]) -> Self {
        Self {
            source: Source::Sequence {
                codes: codes.to_vec(),
                next: 0,
            },
        }
    }
}

impl AnalogInput for MockInput {
    fn read_code(&mut self) -> u16 {
        match &mut self.source {
            Source::Fixed(code) => *code,
            Source::Follow { code, bias } => {
                (code.get() as i32 + *bias).clamp(0, u16::MAX as i32) as u16
            }
            Source::Sequence { codes, next } => {
                let code = codes[*next % codes.len()];
                *next += 1;
                code
            }
        }
    }
}

/// Mock timer which only keeps count of how long it was asked to wait.
#[derive(Debug, Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follower_tracks_output_with_bias() {
        let mut output = MockOutput::new();
        let mut input = MockInput::follow(&output, -10);
        assert_eq!(input.read_code(), 0);
        output.set_code(1000);
        assert_eq!(input.read_code(), 990);
    }

    #[test]
    fn sequence_wraps_around() {
        let mut input = MockInput::sequence(&[1, 2]);
        assert_eq!(input.read_code(), 1);
        assert_eq!(input.read_code(), 2);
        assert_eq!(input.read_code(), 1);
    }

    #[test]
    fn delay_accumulates() {
        use embedded_hal::delay::DelayNs;
        let mut delay = MockDelay::new();
        delay.delay_ms(3);
        delay.delay_us(500);
        delay.delay_us(500);
        assert_eq!(delay.elapsed_ms(), 4);
    }
}
