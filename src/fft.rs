//! Real FFT front-end over the fixed-size microfft kernels
//!
//! The transform length is derived from the sample rate at runtime, so the
//! fixed-size kernels are selected by a size match. The forward transform
//! unpacks microfft's Nyquist-in-DC packing into an explicit `n/2 + 1` bin
//! spectrum; the inverse rebuilds the Hermitian full spectrum and divides by
//! the transform length (microfft's inverse is unnormalized).

use microfft::Complex32;

use crate::error::VocoderError;

/// Transform lengths with an available kernel.
pub fn is_supported(size: usize) -> bool {
    matches!(size, 256 | 512 | 1024 | 2048 | 4096 | 8192 | 16384)
}

macro_rules! dispatch_rfft {
    ($frame:expr, $n:expr, $($size:literal => $func:path),+ $(,)?) => {
        match $n {
            $(
                $size => {
                    let mut buf = [0.0f32; $size];
                    buf.copy_from_slice($frame);
                    $func(&mut buf).to_vec()
                }
            )+
            other => return Err(VocoderError::UnsupportedFrameSize(other)),
        }
    };
}

macro_rules! dispatch_ifft {
    ($spectrum:expr, $n:expr, $($size:literal => $func:path),+ $(,)?) => {
        match $n {
            $(
                $size => {
                    let mut buf = [Complex32 { re: 0.0, im: 0.0 }; $size];
                    buf.copy_from_slice($spectrum);
                    $func(&mut buf).to_vec()
                }
            )+
            other => return Err(VocoderError::UnsupportedFrameSize(other)),
        }
    };
}

/// Forward real FFT; returns `frame.len() / 2 + 1` bins.
pub fn forward(frame: &[f32]) -> Result<Vec<Complex32>, VocoderError> {
    let n = frame.len();
    let mut spectrum = dispatch_rfft!(frame, n,
        256 => microfft::real::rfft_256,
        512 => microfft::real::rfft_512,
        1024 => microfft::real::rfft_1024,
        2048 => microfft::real::rfft_2048,
        4096 => microfft::real::rfft_4096,
        8192 => microfft::real::rfft_8192,
        16384 => microfft::real::rfft_16384,
    );

    // microfft packs the real Nyquist coefficient into the DC imaginary part
    let nyquist = spectrum[0].im;
    spectrum[0].im = 0.0;
    spectrum.push(Complex32 { re: nyquist, im: 0.0 });
    Ok(spectrum)
}

/// Inverse real FFT of an `n/2 + 1` bin spectrum; returns `n` samples.
pub fn inverse(spectrum: &[Complex32]) -> Result<Vec<f32>, VocoderError> {
    if spectrum.len() < 2 {
        return Err(VocoderError::InvariantViolation("spectrum too short for inverse FFT"));
    }
    let half = spectrum.len() - 1;
    let n = half * 2;

    let mut full = vec![Complex32 { re: 0.0, im: 0.0 }; n];
    full[0] = spectrum[0];
    full[half] = spectrum[half];
    for k in 1..half {
        full[k] = spectrum[k];
        full[n - k] = spectrum[k].conj();
    }

    let time = dispatch_ifft!(&full[..], n,
        256 => microfft::inverse::ifft_256,
        512 => microfft::inverse::ifft_512,
        1024 => microfft::inverse::ifft_1024,
        2048 => microfft::inverse::ifft_2048,
        4096 => microfft::inverse::ifft_4096,
        8192 => microfft::inverse::ifft_8192,
        16384 => microfft::inverse::ifft_16384,
    );

    let scale = 1.0 / n as f32;
    Ok(time.iter().map(|c| c.re * scale).collect())
}
