pub mod eci;
