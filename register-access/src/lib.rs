#![no_std]
#![allow(async_fn_in_trait)]

use device_descriptor::{ReadOnlyRegister, Register};

pub trait RegisterReader: Sized {
    fn read<E>(iface: &mut impl RegisterAccess<Error = E>) -> Result<Self, E>;
}

pub trait AsyncRegisterReader: RegisterReader {
    async fn read_async<E>(iface: &mut impl AsyncRegisterAccess<Error = E>) -> Result<Self, E>;
}

pub trait RegisterWriter {
    fn write<E>(self, iface: &mut impl RegisterAccess<Error = E>) -> Result<(), E>;
}

pub trait AsyncRegisterWriter: RegisterWriter {
    async fn write_async<E>(self, iface: &mut impl AsyncRegisterAccess<Error = E>)
        -> Result<(), E>;
}

impl<T> RegisterReader for T
where
    T: ReadOnlyRegister,
{
    fn read<E>(iface: &mut impl RegisterAccess<Error = E>) -> Result<Self, E> {
        iface.read_register()
    }
}

impl<T: ReadOnlyRegister> AsyncRegisterReader for T {
    async fn read_async<E>(iface: &mut impl AsyncRegisterAccess<Error = E>) -> Result<Self, E> {
        iface.read_register_async().await
    }
}

impl<T: Register> RegisterWriter for T {
    fn write<E>(self, iface: &mut impl RegisterAccess<Error = E>) -> Result<(), E> {
        iface.write_register(self)
    }
}

impl<T: Register> AsyncRegisterWriter for T {
    async fn write_async<E>(
        self,
        iface: &mut impl AsyncRegisterAccess<Error = E>,
    ) -> Result<(), E> {
        iface.write_register_async(self).await
    }
}

pub trait RegisterAccess {
    type Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister;

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register;
}

pub trait AsyncRegisterAccess {
    type Error;

    async fn read_register_async<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister;

    async fn write_register_async<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register;
}
